//! Validator service (C10, spec §4.9). Runs the seven ordered SQL rules
//! through [`ValidatorRepository`], step-tracked. Written as a flat sequence
//! of awaited calls rather than a generic loop, matching how the teacher
//! sequences its own fixed pipeline stages (`n8n-core::engine`'s explicit
//! node-by-node walk).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use xlm_db::{DbError, ReferenceCheck, ValidatorRepository};
use xlm_model::step::ValidateStep;

use crate::error::{PipelineError, PipelineResult};
use crate::step_tracker::StepTracker;

/// The fixed column set this engine's domain validates (spec §3's
/// warehouse/case-detail schema — see [`crate::source_row::SourceRow`]).
const REQUIRED_FIELDS: &[&str] = &["unit_code", "box_code", "warehouse_code", "doc_type_name", "doc_date", "quantity"];
const DATE_FIELDS: &[&str] = &["doc_date", "due_date", "handover_date"];
const INTEGER_FIELDS: &[&str] = &["quantity"];

fn reference_checks() -> Vec<ReferenceCheck<'static>> {
    vec![
        ReferenceCheck::uppercase("warehouse_code", "warehouse", "code"),
        ReferenceCheck::uppercase("retention_period", "retention_period", "code"),
        ReferenceCheck {
            field: "doc_type_name",
            master_table: "doc_type",
            master_code_column: "code",
            value_transform: "upper(replace({expr}, ' ', '_'))",
        },
    ]
}

#[derive(Clone)]
pub struct ValidateService {
    validator: ValidatorRepository,
    tracker: Arc<StepTracker>,
}

pub struct ValidateOutcome {
    pub error_rows_written: u64,
    pub promoted_rows: u64,
}

impl ValidateService {
    pub fn new(validator: ValidatorRepository, tracker: Arc<StepTracker>) -> Self {
        Self { validator, tracker }
    }

    pub async fn validate(&self, job_id: &str) -> PipelineResult<ValidateOutcome> {
        self.tracker.init_job(job_id);
        let mut tx = self.validator.begin().await?;
        let mut error_rows_written = 0u64;

        error_rows_written += self
            .run_step(job_id, ValidateStep::RequiredFields, self.validator.check_required_fields(&mut tx, job_id, REQUIRED_FIELDS))
            .await?;

        error_rows_written += self
            .run_step(job_id, ValidateStep::DateFormats, self.validator.check_date_formats(&mut tx, job_id, DATE_FIELDS))
            .await?;

        error_rows_written += self
            .run_step(job_id, ValidateStep::Numerics, self.validator.check_numerics(&mut tx, job_id, INTEGER_FIELDS))
            .await?;

        error_rows_written += self
            .run_step(job_id, ValidateStep::InFileDedup, self.validator.check_in_file_duplicates(&mut tx, job_id))
            .await?;

        let checks = reference_checks();
        error_rows_written += self
            .run_step(job_id, ValidateStep::MasterRefs, self.validator.check_master_references(&mut tx, job_id, &checks))
            .await?;

        error_rows_written += self
            .run_step(job_id, ValidateStep::DbDedup, self.validator.check_db_duplicates(&mut tx, job_id))
            .await?;

        let promoted_rows = self
            .run_step(job_id, ValidateStep::PromoteToValid, self.validator.promote_to_valid(&mut tx, job_id))
            .await?;

        tx.commit().await.map_err(|e| PipelineError::Db(e.into()))?;

        Ok(ValidateOutcome { error_rows_written, promoted_rows })
    }

    /// Marks `step` started, runs `fut` bounded by the step's timeout (spec
    /// §4.9 "Between steps, the tracker's check-timeouts is invoked; a
    /// timed-out step raises and aborts validation"), and records the step's
    /// terminal state — `Completed`/`Failed`/`Timeout` — before returning.
    async fn run_step<F>(&self, job_id: &str, step: ValidateStep, fut: F) -> PipelineResult<u64>
    where
        F: Future<Output = Result<u64, DbError>>,
    {
        self.tracker.mark_started(job_id, step);
        let timeout = Duration::from_secs(step.default_timeout_secs());
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(n)) => {
                self.tracker.mark_completed(job_id, step, n);
                Ok(n)
            }
            Ok(Err(e)) => {
                self.tracker.mark_failed(job_id, step, e.to_string());
                Err(PipelineError::Db(e))
            }
            Err(_elapsed) => {
                self.tracker.mark_timeout(job_id, step);
                Err(PipelineError::StepTimeout {
                    step: step.name().to_string(),
                    timeout_secs: step.default_timeout_secs(),
                })
            }
        }
    }
}
