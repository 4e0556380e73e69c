//! Shared domain types for the Excel-to-relational migration engine.
//!
//! This crate holds no I/O — it is the vocabulary the reader, db, and
//! pipeline crates share so none of them need to depend on each other's
//! internals.

pub mod config;
pub mod job;
pub mod job_sheet;
pub mod phase;
pub mod staging;
pub mod step;

// Re-export entity types explicitly to avoid ambiguous glob re-exports.
pub use config::{PipelineConfig, ReaderConfig};
pub use job::{generate_job_id, Job, JobCounters, JobStatus};
pub use job_sheet::{JobSheet, VersionConflict};
pub use phase::{JobSheetPhaseCounters, Phase, PhaseStats};
pub use staging::{ErrorKind, StagingError, StagingRaw, StagingValid, REQUIRED_FIELD_MISSING_MESSAGE};
pub use step::{StepState, StepStatus, ValidateStep, VALIDATE_STEPS_IN_ORDER};
