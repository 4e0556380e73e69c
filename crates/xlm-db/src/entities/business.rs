//! Business rows (spec §4.10 P3).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Joins unit, doc_type, box, retention_period, and three status references
/// (nullable reference joins use LEFT JOIN per spec §4.10). Carries the
/// business-key columns the validator's duplicate checks and the
/// reconciler's integrity checks reference directly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CaseDetailRow {
    pub id: Uuid,
    pub job_id: String,
    pub unit_id: Uuid,
    pub doc_type_id: Uuid,
    pub box_id: Uuid,
    pub retention_period_id: Option<Uuid>,
    pub case_pdm_status_id: Option<Uuid>,
    pub box_status_id: Option<Uuid>,
    pub box_state_id: Option<Uuid>,
    pub unit_code: String,
    pub box_code: String,
    pub doc_date: NaiveDate,
    pub quantity: i64,
    pub due_date: Option<NaiveDate>,
    pub handover_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
