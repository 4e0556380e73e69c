//! Migration orchestrator: the Step Tracker (C7), the four-phase state
//! machine (C8), and the phase services that drive it — Ingest (C9),
//! Validate (C10), Apply (C11), Reconcile (C12).
//!
//! ```ignore
//! let orchestrator = JobOrchestrator::new(jobs, job_sheets, ingest, validate, apply, reconcile, tracker, config);
//! orchestrator.run(&mut job, &sheets, workbook_path, cancel, events_tx).await?;
//! ```

pub mod apply;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod reconcile;
pub mod source_row;
pub mod step_tracker;
pub mod validate;

pub use apply::{ApplyOutcome, ApplyService};
pub use error::{PipelineError, PipelineResult};
pub use ingest::{IngestOutcome, IngestService};
pub use orchestrator::{JobEvent, JobOrchestrator, OrchestratorOutcome};
pub use reconcile::ReconcileService;
pub use source_row::SourceRow;
pub use step_tracker::StepTracker;
pub use validate::{ValidateOutcome, ValidateService};
