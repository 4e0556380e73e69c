//! Job row — matches `xlm_model::Job`, status/phase stored as text columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use xlm_model::{Job, JobCounters, JobStatus, Phase};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: String,
    pub source_filename: String,
    pub created_by: String,
    pub status: String,
    pub current_phase: String,
    pub progress_percent: f32,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub valid_rows: i64,
    pub error_rows: i64,
    pub inserted_rows: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<i64>,
    pub last_error: Option<String>,
}

impl From<&Job> for JobRow {
    fn from(j: &Job) -> Self {
        Self {
            id: j.id.clone(),
            source_filename: j.source_filename.clone(),
            created_by: j.created_by.clone(),
            status: j.status.as_str().to_string(),
            current_phase: j.current_phase.as_str().to_string(),
            progress_percent: j.progress_percent,
            total_rows: j.counters.total as i64,
            processed_rows: j.counters.processed as i64,
            valid_rows: j.counters.valid as i64,
            error_rows: j.counters.error as i64,
            inserted_rows: j.counters.inserted as i64,
            created_at: j.created_at,
            started_at: j.started_at,
            completed_at: j.completed_at,
            processing_time_ms: j.processing_time_ms,
            last_error: j.last_error.clone(),
        }
    }
}

impl From<JobRow> for Job {
    fn from(r: JobRow) -> Self {
        Job {
            id: r.id,
            source_filename: r.source_filename,
            created_by: r.created_by,
            status: JobStatus::from_str(&r.status),
            current_phase: phase_from_str(&r.current_phase),
            progress_percent: r.progress_percent,
            counters: JobCounters {
                total: r.total_rows.max(0) as u64,
                processed: r.processed_rows.max(0) as u64,
                valid: r.valid_rows.max(0) as u64,
                error: r.error_rows.max(0) as u64,
                inserted: r.inserted_rows.max(0) as u64,
            },
            created_at: r.created_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
            processing_time_ms: r.processing_time_ms,
            last_error: r.last_error,
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
