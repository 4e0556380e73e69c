//! Error types for the migration orchestrator and its phase services.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("reader error: {0}")]
    Reader(#[from] xlm_reader::ReaderError),

    #[error("database error: {0}")]
    Db(#[from] xlm_db::DbError),

    #[error("step '{step}' timed out after {timeout_secs}s")]
    StepTimeout { step: String, timeout_secs: u64 },

    #[error("job {0} not found in step tracker")]
    JobNotTracked(String),

    #[error("no sheets matched the reader configuration")]
    NoSheetsSelected,

    #[error("job was canceled")]
    Canceled,

    #[error("invalid phase transition: {0}")]
    InvalidPhaseTransition(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
