//! Database error types.

use thiserror::Error;

/// Database operation errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("entity not found")]
    NotFound,

    #[error("optimistic lock conflict: {0}")]
    VersionConflict(#[from] xlm_model::VersionConflict),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("transaction error: {0}")]
    TransactionError(String),

    #[error("migration error: {0}")]
    MigrationError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("database error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict(_))
    }
}

pub type DbResult<T> = Result<T, DbError>;
