//! Staging repository — bulk inserts, one transaction per batch (spec §4.6
//! C9: "bulk-inserts each full buffer in its own transaction").

use sqlx::{PgPool, QueryBuilder};

use xlm_model::StagingRaw;

use crate::entities::StagingErrorRow;
use crate::error::DbError;

#[derive(Clone)]
pub struct StagingRepository {
    pool: PgPool,
}

impl StagingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts one batch of raw rows inside its own transaction. Safe to
    /// call concurrently from independent worker threads/tasks — each call
    /// opens and commits its own transaction, touching no shared buffer
    /// (spec §4.6 thread-safety note).
    pub async fn bulk_insert_raw(&self, batch: &[StagingRaw]) -> Result<u64, DbError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        // Postgres caps bind parameters per statement; chunk generously
        // below that ceiling rather than one row per round trip.
        for chunk in batch.chunks(500) {
            let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO staging_raw (job_id, sheet_name, row_num, fields, normalized_fields, parse_errors, created_at) ",
            );
            qb.push_values(chunk, |mut b, row| {
                // `sheet_name` is `NOT NULL DEFAULT ''` in the schema (it sits
                // in the primary key, which Postgres requires non-null), so a
                // domain-level `None` must become `""` rather than an
                // explicit SQL NULL.
                b.push_bind(&row.job_id)
                    .push_bind(row.sheet_name.as_deref().unwrap_or("").to_string())
                    .push_bind(row.row_num)
                    .push_bind(serde_json::to_value(&row.fields).unwrap_or_default())
                    .push_bind(serde_json::to_value(&row.normalized_fields).unwrap_or_default())
                    .push_bind(&row.parse_errors)
                    .push_bind(row.created_at);
            });
            let result = qb.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn count_for_job(&self, job_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM staging_raw WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn count_valid_for_job(&self, job_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM staging_valid WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Per-`ErrorKind` counts for a job (spec §6 "errors/stats").
    pub async fn error_counts_by_kind(&self, job_id: &str) -> Result<Vec<(String, i64)>, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT error_type, COUNT(*) FROM staging_error WHERE job_id = $1 GROUP BY error_type ORDER BY error_type",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All error rows for a job, ordered for a stable export (spec §6
    /// "errors/download").
    pub async fn list_errors(&self, job_id: &str) -> Result<Vec<StagingErrorRow>, DbError> {
        let rows = sqlx::query_as::<_, StagingErrorRow>(
            r#"
            SELECT job_id, sheet_name, row_num, error_type, error_field, error_value, error_message, original_data, created_at
            FROM staging_error WHERE job_id = $1 ORDER BY sheet_name, row_num
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Cleans up staging rows for a completed job, optionally retaining
    /// error rows for later inspection (spec §4.8: "clean up staging data
    /// (optionally retaining error rows)").
    pub async fn cleanup(&self, job_id: &str, retain_errors: bool) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM staging_raw WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM staging_valid WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        if !retain_errors {
            sqlx::query("DELETE FROM staging_error WHERE job_id = $1")
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
