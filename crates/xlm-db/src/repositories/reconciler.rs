//! Reconciler repository (C12, spec §4.11). Four consistency checks plus a
//! memory usage report; returns up to 100 representative validation errors.

use serde::Serialize;
use sqlx::PgPool;

use crate::error::DbError;

#[derive(Debug, Serialize)]
pub struct ReconciliationReport {
    pub staging_valid_count: i64,
    pub case_detail_count: i64,
    pub counts_match: bool,
    pub untreated_ref_errors: i64,
    pub duplicate_business_keys: i64,
    pub date_order_violations: i64,
    pub memory: MemoryUsage,
    pub sample_errors: Vec<ValidationErrorSummary>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.counts_match
            && self.untreated_ref_errors == 0
            && self.duplicate_business_keys == 0
            && self.date_order_violations == 0
    }
}

#[derive(Debug, Serialize)]
pub struct MemoryUsage {
    pub used_mb: u64,
    pub total_mb: u64,
    pub free_mb: u64,
}

#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct ValidationErrorSummary {
    pub sheet_name: String,
    pub row_num: i64,
    pub error_type: String,
    pub error_field: Option<String>,
    pub error_message: Option<String>,
}

const SAMPLE_ERROR_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct ReconcilerRepository {
    pool: PgPool,
}

impl ReconcilerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn reconcile(&self, job_id: &str) -> Result<ReconciliationReport, DbError> {
        let (staging_valid_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM staging_valid WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(&self.pool)
                .await?;

        let (case_detail_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM case_detail WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(&self.pool)
                .await?;

        let untreated_ref_errors = self.count_untreated_ref_errors(job_id).await?;
        let duplicate_business_keys = self.count_duplicate_business_keys(job_id).await?;
        let date_order_violations = self.count_date_order_violations(job_id).await?;
        let memory = current_memory_usage();
        let sample_errors = self.sample_errors(job_id).await?;

        Ok(ReconciliationReport {
            staging_valid_count,
            case_detail_count,
            counts_match: staging_valid_count == case_detail_count,
            untreated_ref_errors,
            duplicate_business_keys,
            date_order_violations,
            memory,
            sample_errors,
        })
    }

    /// A `REF_NOT_FOUND` error is "untreated" if the row it names never made
    /// it into `staging_valid` but also was never superseded by a later,
    /// corrected import for the same job.
    async fn count_untreated_ref_errors(&self, job_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM staging_error e
            WHERE e.job_id = $1 AND e.error_type = 'REF_NOT_FOUND'
              AND NOT EXISTS (
                  SELECT 1 FROM staging_valid v
                  WHERE v.job_id = e.job_id AND v.row_num = e.row_num AND v.sheet_name = e.sheet_name
              )
            "#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Duplicate business keys among `case_detail` rows tracing to this job
    /// (spec §4.11 check 3).
    async fn count_duplicate_business_keys(&self, job_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM (
                SELECT unit_code, box_code
                FROM case_detail
                WHERE job_id = $1
                GROUP BY unit_code, box_code
                HAVING COUNT(*) > 1
            ) dups
            "#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// `due_date <= handover_date` when both present and `quantity > 0`
    /// (spec §4.11 check 4).
    async fn count_date_order_violations(&self, job_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM case_detail
            WHERE job_id = $1
              AND quantity > 0
              AND due_date IS NOT NULL AND handover_date IS NOT NULL
              AND due_date > handover_date
            "#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn sample_errors(&self, job_id: &str) -> Result<Vec<ValidationErrorSummary>, DbError> {
        let rows = sqlx::query_as::<_, ValidationErrorSummary>(
            r#"
            SELECT sheet_name, row_num, error_type, error_field, error_message
            FROM staging_error
            WHERE job_id = $1
            ORDER BY row_num
            LIMIT $2
            "#,
        )
        .bind(job_id)
        .bind(SAMPLE_ERROR_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Reads process memory from `/proc/self/status` and `/proc/meminfo` on
/// Linux; returns zeros elsewhere rather than failing reconciliation over an
/// unavailable diagnostic.
fn current_memory_usage() -> MemoryUsage {
    #[cfg(target_os = "linux")]
    {
        let used_mb = std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("VmRSS:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok())
            })
            .map(|kb| kb / 1024)
            .unwrap_or(0);

        let meminfo = std::fs::read_to_string("/proc/meminfo").unwrap_or_default();
        let total_mb = parse_meminfo_kb(&meminfo, "MemTotal:") / 1024;
        let free_mb = parse_meminfo_kb(&meminfo, "MemAvailable:") / 1024;

        MemoryUsage { used_mb, total_mb, free_mb }
    }
    #[cfg(not(target_os = "linux"))]
    {
        MemoryUsage { used_mb: 0, total_mb: 0, free_mb: 0 }
    }
}

#[cfg(target_os = "linux")]
fn parse_meminfo_kb(meminfo: &str, key: &str) -> u64 {
    meminfo
        .lines()
        .find(|l| l.starts_with(key))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_clean_requires_all_checks_to_pass() {
        let report = ReconciliationReport {
            staging_valid_count: 10,
            case_detail_count: 10,
            counts_match: true,
            untreated_ref_errors: 0,
            duplicate_business_keys: 0,
            date_order_violations: 0,
            memory: MemoryUsage { used_mb: 1, total_mb: 2, free_mb: 1 },
            sample_errors: vec![],
        };
        assert!(report.is_clean());

        let mut dirty = report;
        dirty.duplicate_business_keys = 1;
        assert!(!dirty.is_clean());
    }
}
