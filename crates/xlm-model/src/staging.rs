//! Staging row shapes and the closed error-kind set (spec §3, §7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed set of violation kinds. Every row written to `staging_error` uses
/// exactly one of these (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RequiredMissing,
    InvalidDate,
    InvalidNumeric,
    DupInFile,
    DupInDb,
    RefNotFound,
}

/// The exact message text spec.md §8 scenario 3 pins to `REQUIRED_MISSING`
/// violations: "message text is part of the contract".
pub const REQUIRED_FIELD_MISSING_MESSAGE: &str = "Trường bắt buộc không được để trống";

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RequiredMissing => "REQUIRED_MISSING",
            ErrorKind::InvalidDate => "INVALID_DATE",
            ErrorKind::InvalidNumeric => "INVALID_NUMERIC",
            ErrorKind::DupInFile => "DUP_IN_FILE",
            ErrorKind::DupInDb => "DUP_IN_DB",
            ErrorKind::RefNotFound => "REF_NOT_FOUND",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "REQUIRED_MISSING" => ErrorKind::RequiredMissing,
            "INVALID_DATE" => ErrorKind::InvalidDate,
            "INVALID_NUMERIC" => ErrorKind::InvalidNumeric,
            "DUP_IN_FILE" => ErrorKind::DupInFile,
            "DUP_IN_DB" => ErrorKind::DupInDb,
            "REF_NOT_FOUND" => ErrorKind::RefNotFound,
            _ => return None,
        })
    }
}

/// An unvalidated row snapshot, as it comes off the reader (spec §3
/// "StagingRaw"). `fields` holds one entry per source spreadsheet column,
/// keyed by the external column name the Type Introspection Cache resolved;
/// `normalized_fields` holds the C2-normalized twin for identifier/date
/// columns used as join keys downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingRaw {
    pub job_id: String,
    pub sheet_name: Option<String>,
    pub row_num: i64,
    pub fields: BTreeMap<String, String>,
    pub normalized_fields: BTreeMap<String, String>,
    pub parse_errors: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StagingRaw {
    pub fn new(job_id: impl Into<String>, sheet_name: Option<String>, row_num: i64) -> Self {
        Self {
            job_id: job_id.into(),
            sheet_name,
            row_num,
            fields: BTreeMap::new(),
            normalized_fields: BTreeMap::new(),
            parse_errors: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_parse_errors(&self) -> bool {
        self.parse_errors.is_some()
    }
}

/// A typed, canonical row ready to apply (spec §3 "StagingValid"). Row
/// identity is `(job_id, sheet_name, row_num)` — `row_num` alone is only
/// unique within a single sheet (spec §3 "StagingRaw" row identity, I1/I3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingValid {
    pub job_id: String,
    pub sheet_name: Option<String>,
    pub row_num: i64,
    pub fields: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// A violation record (spec §3 "StagingError").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingError {
    pub job_id: String,
    pub sheet_name: Option<String>,
    pub row_num: i64,
    pub error_type: ErrorKind,
    pub error_field: String,
    pub error_value: Option<String>,
    pub error_message: String,
    pub original_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_round_trips() {
        for kind in [
            ErrorKind::RequiredMissing,
            ErrorKind::InvalidDate,
            ErrorKind::InvalidNumeric,
            ErrorKind::DupInFile,
            ErrorKind::DupInDb,
            ErrorKind::RefNotFound,
        ] {
            assert_eq!(ErrorKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_str("NOT_A_KIND"), None);
    }
}
