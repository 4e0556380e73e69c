//! Step Tracker types (spec §3 "StepStatus", §4.7). Process-local only —
//! never persisted (I6 note: per-job in-memory state lives here, owned by the
//! process, indexed by job id, explicitly cleaned up on job completion).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Timeout,
}

impl StepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Pending => "PENDING",
            StepState::InProgress => "IN_PROGRESS",
            StepState::Completed => "COMPLETED",
            StepState::Failed => "FAILED",
            StepState::Timeout => "TIMEOUT",
        }
    }
}

/// The fixed, totally ordered validate steps (spec §3 I5, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidateStep {
    RequiredFields,
    DateFormats,
    Numerics,
    InFileDedup,
    MasterRefs,
    DbDedup,
    PromoteToValid,
}

pub const VALIDATE_STEPS_IN_ORDER: [ValidateStep; 7] = [
    ValidateStep::RequiredFields,
    ValidateStep::DateFormats,
    ValidateStep::Numerics,
    ValidateStep::InFileDedup,
    ValidateStep::MasterRefs,
    ValidateStep::DbDedup,
    ValidateStep::PromoteToValid,
];

impl ValidateStep {
    pub fn name(&self) -> &'static str {
        match self {
            ValidateStep::RequiredFields => "REQUIRED_FIELDS",
            ValidateStep::DateFormats => "DATE_FORMATS",
            ValidateStep::Numerics => "NUMERICS",
            ValidateStep::InFileDedup => "IN_FILE_DEDUP",
            ValidateStep::MasterRefs => "MASTER_REFS",
            ValidateStep::DbDedup => "DB_DEDUP",
            ValidateStep::PromoteToValid => "MOVE_VALID_RECORDS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ValidateStep::RequiredFields => "Check required fields are present",
            ValidateStep::DateFormats => "Validate date-shaped column formats",
            ValidateStep::Numerics => "Validate positive-integer columns",
            ValidateStep::InFileDedup => "Detect duplicate business keys within the file",
            ValidateStep::MasterRefs => "Resolve master-table references",
            ValidateStep::DbDedup => "Detect business keys already present in the database",
            ValidateStep::PromoteToValid => "Promote error-free rows into staging_valid",
        }
    }

    /// Default per-step timeout. `PromoteToValid` gets 15 minutes; every
    /// other step gets 5 minutes (spec §4.7, §5).
    pub fn default_timeout_secs(&self) -> u64 {
        match self {
            ValidateStep::PromoteToValid => 15 * 60,
            _ => 5 * 60,
        }
    }

    pub fn ordinal(&self) -> usize {
        VALIDATE_STEPS_IN_ORDER
            .iter()
            .position(|s| s == self)
            .expect("every ValidateStep appears in VALIDATE_STEPS_IN_ORDER")
    }
}

/// Per (job, step) tracked state, in-memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub step_name: String,
    pub ordinal: usize,
    pub description: String,
    pub state: StepState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub affected_rows: Option<u64>,
    pub last_error: Option<String>,
    pub timeout_secs: u64,
}

impl StepStatus {
    pub fn pending(step: ValidateStep) -> Self {
        Self {
            step_name: step.name().to_string(),
            ordinal: step.ordinal(),
            description: step.description().to_string(),
            state: StepState::Pending,
            start_time: None,
            end_time: None,
            duration_ms: None,
            affected_rows: None,
            last_error: None,
            timeout_secs: step.default_timeout_secs(),
        }
    }

    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        match (self.state, self.start_time) {
            (StepState::InProgress, Some(start)) => {
                (now - start).num_seconds() as u64 > self.timeout_secs
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_to_valid_gets_fifteen_minutes() {
        assert_eq!(
            ValidateStep::PromoteToValid.default_timeout_secs(),
            15 * 60
        );
        assert_eq!(ValidateStep::RequiredFields.default_timeout_secs(), 5 * 60);
    }

    #[test]
    fn steps_are_totally_ordered() {
        for (i, step) in VALIDATE_STEPS_IN_ORDER.iter().enumerate() {
            assert_eq!(step.ordinal(), i);
        }
    }
}
