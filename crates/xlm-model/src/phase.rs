//! The four-phase state machine a job moves through (spec §1, §4.8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Ingest,
    Validate,
    Apply,
    Reconcile,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ingest => "INGEST",
            Phase::Validate => "VALIDATE",
            Phase::Apply => "APPLY",
            Phase::Reconcile => "RECONCILE",
        }
    }

    /// The phase that follows this one, or `None` past `Reconcile`.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Ingest => Some(Phase::Validate),
            Phase::Validate => Some(Phase::Apply),
            Phase::Apply => Some(Phase::Reconcile),
            Phase::Reconcile => None,
        }
    }
}

/// Per-phase row counters and durations tracked on a `JobSheet` (spec §3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseStats {
    pub rows: u64,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobSheetPhaseCounters {
    pub ingest: PhaseStats,
    pub validation: PhaseStats,
    pub insertion: PhaseStats,
    pub total: PhaseStats,
}
