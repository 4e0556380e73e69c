//! Staging rows: raw, valid, and error tables (spec §3, §4.9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// `staging_raw` — one row per ingested source row. `fields`/`normalized_fields`
/// are stored as a JSONB bag rather than fixed columns so the reader never
/// needs a schema migration to onboard a new workbook layout; the validator's
/// generated SQL reads out of this bag by key (spec §3 "staging tables carry
/// a generic fields bag").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StagingRawRow {
    pub job_id: String,
    pub sheet_name: Option<String>,
    pub row_num: i64,
    #[sqlx(json)]
    pub fields: serde_json::Value,
    #[sqlx(json)]
    pub normalized_fields: serde_json::Value,
    pub parse_errors: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StagingValidRow {
    pub job_id: String,
    pub sheet_name: Option<String>,
    pub row_num: i64,
    #[sqlx(json)]
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StagingErrorRow {
    pub job_id: String,
    pub sheet_name: Option<String>,
    pub row_num: i64,
    pub error_type: String,
    pub error_field: String,
    pub error_value: Option<String>,
    pub error_message: String,
    pub original_data: Option<String>,
    pub created_at: DateTime<Utc>,
}
