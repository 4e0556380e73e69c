//! Master/reference tables the applier upserts into (spec §4.10 P1/P2).
//! Concrete columns, unlike the staging tables' JSON bag, because the
//! applier's generated SQL joins on named business keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WarehouseRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UnitRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocTypeRow {
    pub id: Uuid,
    /// Derived by uppercasing the source name and substituting spaces with
    /// underscores (spec §4.10 P1).
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Status master, partitioned by which case family it belongs to (spec
/// §4.10 P1: "three type-partitions: CASE_PDM, BOX_STATUS, BOX_STATE").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPartition {
    CasePdm,
    BoxStatus,
    BoxState,
}

impl StatusPartition {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPartition::CasePdm => "CASE_PDM",
            StatusPartition::BoxStatus => "BOX_STATUS",
            StatusPartition::BoxState => "BOX_STATE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatusRow {
    pub id: Uuid,
    pub partition: String,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RetentionPeriodRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Dependent master (P2): identified by an (area, row, col) tuple.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocationRow {
    pub id: Uuid,
    pub area: String,
    pub row_code: String,
    pub col_code: String,
    pub warehouse_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Dependent master (P2): joins warehouse, location, and two status rows
/// (box_status, box_state).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BoxRow {
    pub id: Uuid,
    pub code: String,
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    pub box_status_id: Option<Uuid>,
    pub box_state_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
