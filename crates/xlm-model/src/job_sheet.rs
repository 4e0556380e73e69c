//! JobSheet — one row per (job, sheet_name), optimistically locked (spec §3 I4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;
use crate::phase::{JobSheetPhaseCounters, Phase};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSheet {
    pub job_id: String,
    pub sheet_name: String,
    pub sheet_ordinal: i32,
    pub status: JobStatus,
    pub current_phase: Phase,
    pub progress_percent: f32,
    pub counters: JobSheetPhaseCounters,
    pub last_error: Option<String>,
    /// Optimistic-lock version. Every update is `WHERE id = ? AND version = ?`
    /// with an incremented value; a zero-row update means re-read and retry (I4).
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobSheet {
    pub fn new(job_id: impl Into<String>, sheet_name: impl Into<String>, ordinal: i32) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            sheet_name: sheet_name.into(),
            sheet_ordinal: ordinal,
            status: JobStatus::Started,
            current_phase: Phase::Ingest,
            progress_percent: 0.0,
            counters: JobSheetPhaseCounters::default(),
            last_error: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Raised when an optimistic-lock compare-and-swap update affects zero rows.
/// The caller is expected to re-read the row and retry up to a small bound (I4).
#[derive(Debug, thiserror::Error)]
#[error("optimistic lock conflict on job_sheet ({job_id}, {sheet_name}) at version {expected_version}")]
pub struct VersionConflict {
    pub job_id: String,
    pub sheet_name: String,
    pub expected_version: i64,
}
