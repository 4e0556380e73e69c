//! Repository implementations for database operations.
//!
//! These repositories provide async CRUD operations with hand-built SQL
//! (the staging tables carry a JSONB fields bag, so most validator/applier
//! queries are dynamically formatted rather than compile-time checked).

pub mod applier;
pub mod job;
pub mod job_sheet;
pub mod reconciler;
pub mod staging;
pub mod validator;

pub use applier::ApplierRepository;
pub use job::JobRepository;
pub use job_sheet::JobSheetRepository;
pub use reconciler::{MemoryUsage, ReconcilerRepository, ReconciliationReport, ValidationErrorSummary};
pub use staging::StagingRepository;
pub use validator::{ReferenceCheck, ValidatorRepository};

use sqlx::PgPool;

/// Database context containing all repositories.
#[derive(Clone)]
pub struct DbContext {
    pub pool: PgPool,
    pub jobs: JobRepository,
    pub job_sheets: JobSheetRepository,
    pub staging: StagingRepository,
    pub validator: ValidatorRepository,
    pub applier: ApplierRepository,
    pub reconciler: ReconcilerRepository,
}

impl DbContext {
    pub fn new(pool: PgPool) -> Self {
        Self {
            jobs: JobRepository::new(pool.clone()),
            job_sheets: JobSheetRepository::new(pool.clone()),
            staging: StagingRepository::new(pool.clone()),
            validator: ValidatorRepository::new(pool.clone()),
            applier: ApplierRepository::new(pool.clone()),
            reconciler: ReconcilerRepository::new(pool.clone()),
            pool,
        }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}
