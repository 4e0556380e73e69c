//! Job entity — matches the migration engine's job lifecycle.
//!
//! Reference: spec §3 "Job", §3 invariant I6/I7.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Lifecycle status of a migration job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Started,
    Ingesting,
    IngestingCompleted,
    Validating,
    ValidationCompleted,
    Applying,
    ApplyCompleted,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Started => "STARTED",
            JobStatus::Ingesting => "INGESTING",
            JobStatus::IngestingCompleted => "INGESTING_COMPLETED",
            JobStatus::Validating => "VALIDATING",
            JobStatus::ValidationCompleted => "VALIDATION_COMPLETED",
            JobStatus::Applying => "APPLYING",
            JobStatus::ApplyCompleted => "APPLY_COMPLETED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "INGESTING" => JobStatus::Ingesting,
            "INGESTING_COMPLETED" => JobStatus::IngestingCompleted,
            "VALIDATING" => JobStatus::Validating,
            "VALIDATION_COMPLETED" => JobStatus::ValidationCompleted,
            "APPLYING" => JobStatus::Applying,
            "APPLY_COMPLETED" => JobStatus::ApplyCompleted,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Started,
        }
    }

    /// Terminal states after which no further phase transitions occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Aggregate row counters tracked on a `Job`. Eventually consistent with the
/// sum over its `JobSheet`s at the end of each phase (I6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobCounters {
    pub total: u64,
    pub processed: u64,
    pub valid: u64,
    pub error: u64,
    pub inserted: u64,
}

/// A single migration job: one uploaded workbook, tracked end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub source_filename: String,
    pub created_by: String,
    pub status: JobStatus,
    pub current_phase: Phase,
    pub progress_percent: f32,
    pub counters: JobCounters,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<i64>,
    pub last_error: Option<String>,
}

impl Job {
    pub fn new(source_filename: impl Into<String>, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_job_id(now),
            source_filename: source_filename.into(),
            created_by: created_by.into(),
            status: JobStatus::Started,
            current_phase: Phase::Ingest,
            progress_percent: 0.0,
            counters: JobCounters::default(),
            created_at: now,
            started_at: None,
            completed_at: None,
            processing_time_ms: None,
            last_error: None,
        }
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.last_error = Some(message.into());
    }
}

/// `JOB_YYYYMMDDHHMMSS_XXXXXXXX` — timestamp plus 8 random hex chars.
pub fn generate_job_id(at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y%m%d%H%M%S");
    let suffix: String = (0..8)
        .map(|_| {
            let n: u8 = rand::random::<u8>() % 16;
            std::char::from_digit(n as u32, 16).unwrap()
        })
        .collect();
    format!("JOB_{}_{}", stamp, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_has_expected_shape() {
        let id = generate_job_id(Utc::now());
        assert!(id.starts_with("JOB_"));
        let parts: Vec<&str> = id.trim_start_matches("JOB_").split('_').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 14);
        assert_eq!(parts[1].len(), 8);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            JobStatus::Started,
            JobStatus::Ingesting,
            JobStatus::IngestingCompleted,
            JobStatus::Validating,
            JobStatus::ValidationCompleted,
            JobStatus::Applying,
            JobStatus::ApplyCompleted,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), status);
        }
    }
}
