//! JobSheet repository — optimistic-locked updates (spec §3 I4, §5).

use sqlx::PgPool;

use xlm_model::{JobSheet, VersionConflict};

use crate::entities::JobSheetRow;
use crate::error::DbError;

/// Small bounded retry count for the read-modify-retry loop on a version
/// conflict (spec §5: "bounded small retry, e.g. 3").
const MAX_CAS_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct JobSheetRepository {
    pool: PgPool,
}

impl JobSheetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, sheet: &JobSheet) -> Result<(), DbError> {
        let row = JobSheetRow::from(sheet);
        sqlx::query(
            r#"
            INSERT INTO job_sheet (
                job_id, sheet_name, sheet_ordinal, status, current_phase, progress_percent,
                ingest_rows, ingest_duration_ms, validation_rows, validation_duration_ms,
                insertion_rows, insertion_duration_ms, total_rows, total_duration_ms,
                last_error, version, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
            "#,
        )
        .bind(&row.job_id)
        .bind(&row.sheet_name)
        .bind(row.sheet_ordinal)
        .bind(&row.status)
        .bind(&row.current_phase)
        .bind(row.progress_percent)
        .bind(row.ingest_rows)
        .bind(row.ingest_duration_ms)
        .bind(row.validation_rows)
        .bind(row.validation_duration_ms)
        .bind(row.insertion_rows)
        .bind(row.insertion_duration_ms)
        .bind(row.total_rows)
        .bind(row.total_duration_ms)
        .bind(&row.last_error)
        .bind(row.version)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(&self, job_id: &str, sheet_name: &str) -> Result<Option<JobSheet>, DbError> {
        let row = sqlx::query_as::<_, JobSheetRow>(
            r#"
            SELECT job_id, sheet_name, sheet_ordinal, status, current_phase, progress_percent,
                   ingest_rows, ingest_duration_ms, validation_rows, validation_duration_ms,
                   insertion_rows, insertion_duration_ms, total_rows, total_duration_ms,
                   last_error, version, created_at, updated_at
            FROM job_sheet WHERE job_id = $1 AND sheet_name = $2
            "#,
        )
        .bind(job_id)
        .bind(sheet_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JobSheet::from))
    }

    pub async fn list_for_job(&self, job_id: &str) -> Result<Vec<JobSheet>, DbError> {
        let rows = sqlx::query_as::<_, JobSheetRow>(
            r#"
            SELECT job_id, sheet_name, sheet_ordinal, status, current_phase, progress_percent,
                   ingest_rows, ingest_duration_ms, validation_rows, validation_duration_ms,
                   insertion_rows, insertion_duration_ms, total_rows, total_duration_ms,
                   last_error, version, created_at, updated_at
            FROM job_sheet WHERE job_id = $1 ORDER BY sheet_ordinal
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JobSheet::from).collect())
    }

    /// Applies `mutate` to the current row and writes it back with a
    /// `WHERE … AND version = ?` compare-and-swap, retrying the whole
    /// read-mutate-write cycle up to [`MAX_CAS_RETRIES`] times on conflict.
    pub async fn update_with_retry<F>(
        &self,
        job_id: &str,
        sheet_name: &str,
        mut mutate: F,
    ) -> Result<JobSheet, DbError>
    where
        F: FnMut(&mut JobSheet),
    {
        for attempt in 0..=MAX_CAS_RETRIES {
            let mut sheet = self
                .find(job_id, sheet_name)
                .await?
                .ok_or(DbError::NotFound)?;
            let expected_version = sheet.version;
            mutate(&mut sheet);
            sheet.version = expected_version + 1;
            sheet.updated_at = chrono::Utc::now();

            match self.try_cas_update(&sheet, expected_version).await {
                Ok(true) => return Ok(sheet),
                Ok(false) if attempt < MAX_CAS_RETRIES => {
                    tracing::debug!(job_id, sheet_name, attempt, "job_sheet CAS conflict, retrying");
                    continue;
                }
                Ok(false) => {
                    return Err(DbError::VersionConflict(VersionConflict {
                        job_id: job_id.to_string(),
                        sheet_name: sheet_name.to_string(),
                        expected_version,
                    }))
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop always returns within MAX_CAS_RETRIES + 1 iterations")
    }

    async fn try_cas_update(&self, sheet: &JobSheet, expected_version: i64) -> Result<bool, DbError> {
        let row = JobSheetRow::from(sheet);
        let result = sqlx::query(
            r#"
            UPDATE job_sheet SET
                status = $3, current_phase = $4, progress_percent = $5,
                ingest_rows = $6, ingest_duration_ms = $7,
                validation_rows = $8, validation_duration_ms = $9,
                insertion_rows = $10, insertion_duration_ms = $11,
                total_rows = $12, total_duration_ms = $13,
                last_error = $14, version = $15, updated_at = $16
            WHERE job_id = $1 AND sheet_name = $2 AND version = $17
            "#,
        )
        .bind(&row.job_id)
        .bind(&row.sheet_name)
        .bind(&row.status)
        .bind(&row.current_phase)
        .bind(row.progress_percent)
        .bind(row.ingest_rows)
        .bind(row.ingest_duration_ms)
        .bind(row.validation_rows)
        .bind(row.validation_duration_ms)
        .bind(row.insertion_rows)
        .bind(row.insertion_duration_ms)
        .bind(row.total_rows)
        .bind(row.total_duration_ms)
        .bind(&row.last_error)
        .bind(row.version)
        .bind(row.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
