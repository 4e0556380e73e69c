//! JobSheet row — one per (job, sheet), optimistically locked via `version`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use xlm_model::{JobSheet, JobSheetPhaseCounters, JobStatus, Phase, PhaseStats};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobSheetRow {
    pub job_id: String,
    pub sheet_name: String,
    pub sheet_ordinal: i32,
    pub status: String,
    pub current_phase: String,
    pub progress_percent: f32,
    pub ingest_rows: i64,
    pub ingest_duration_ms: i64,
    pub validation_rows: i64,
    pub validation_duration_ms: i64,
    pub insertion_rows: i64,
    pub insertion_duration_ms: i64,
    pub total_rows: i64,
    pub total_duration_ms: i64,
    pub last_error: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&JobSheet> for JobSheetRow {
    fn from(s: &JobSheet) -> Self {
        Self {
            job_id: s.job_id.clone(),
            sheet_name: s.sheet_name.clone(),
            sheet_ordinal: s.sheet_ordinal,
            status: s.status.as_str().to_string(),
            current_phase: s.current_phase.as_str().to_string(),
            progress_percent: s.progress_percent,
            ingest_rows: s.counters.ingest.rows as i64,
            ingest_duration_ms: s.counters.ingest.duration_ms,
            validation_rows: s.counters.validation.rows as i64,
            validation_duration_ms: s.counters.validation.duration_ms,
            insertion_rows: s.counters.insertion.rows as i64,
            insertion_duration_ms: s.counters.insertion.duration_ms,
            total_rows: s.counters.total.rows as i64,
            total_duration_ms: s.counters.total.duration_ms,
            last_error: s.last_error.clone(),
            version: s.version,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

impl From<JobSheetRow> for JobSheet {
    fn from(r: JobSheetRow) -> Self {
        JobSheet {
            job_id: r.job_id,
            sheet_name: r.sheet_name,
            sheet_ordinal: r.sheet_ordinal,
            status: JobStatus::from_str(&r.status),
            current_phase: phase_from_str(&r.current_phase),
            progress_percent: r.progress_percent,
            counters: JobSheetPhaseCounters {
                ingest: PhaseStats {
                    rows: r.ingest_rows.max(0) as u64,
                    duration_ms: r.ingest_duration_ms,
                },
                validation: PhaseStats {
                    rows: r.validation_rows.max(0) as u64,
                    duration_ms: r.validation_duration_ms,
                },
                insertion: PhaseStats {
                    rows: r.insertion_rows.max(0) as u64,
                    duration_ms: r.insertion_duration_ms,
                },
                total: PhaseStats {
                    rows: r.total_rows.max(0) as u64,
                    duration_ms: r.total_duration_ms,
                },
            },
            last_error: r.last_error,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

fn phase_from_str(s: &str) -> Phase {
    match s {
        "VALIDATE" => Phase::Validate,
        "APPLY" => Phase::Apply,
        "RECONCILE" => Phase::Reconcile,
        _ => Phase::Ingest,
    }
}
