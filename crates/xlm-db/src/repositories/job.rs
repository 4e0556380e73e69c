//! Job repository.

use sqlx::PgPool;

use xlm_model::Job;

use crate::entities::JobRow;
use crate::error::DbError;

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, job: &Job) -> Result<(), DbError> {
        let row = JobRow::from(job);
        sqlx::query(
            r#"
            INSERT INTO job (
                id, source_filename, created_by, status, current_phase, progress_percent,
                total_rows, processed_rows, valid_rows, error_rows, inserted_rows,
                created_at, started_at, completed_at, processing_time_ms, last_error
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            "#,
        )
        .bind(&row.id)
        .bind(&row.source_filename)
        .bind(&row.created_by)
        .bind(&row.status)
        .bind(&row.current_phase)
        .bind(row.progress_percent)
        .bind(row.total_rows)
        .bind(row.processed_rows)
        .bind(row.valid_rows)
        .bind(row.error_rows)
        .bind(row.inserted_rows)
        .bind(row.created_at)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(row.processing_time_ms)
        .bind(&row.last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Job>, DbError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, source_filename, created_by, status, current_phase, progress_percent,
                   total_rows, processed_rows, valid_rows, error_rows, inserted_rows,
                   created_at, started_at, completed_at, processing_time_ms, last_error
            FROM job WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Job::from))
    }

    pub async fn update(&self, job: &Job) -> Result<(), DbError> {
        let row = JobRow::from(job);
        let result = sqlx::query(
            r#"
            UPDATE job SET
                status = $2, current_phase = $3, progress_percent = $4,
                total_rows = $5, processed_rows = $6, valid_rows = $7,
                error_rows = $8, inserted_rows = $9, started_at = $10,
                completed_at = $11, processing_time_ms = $12, last_error = $13
            WHERE id = $1
            "#,
        )
        .bind(&row.id)
        .bind(&row.status)
        .bind(&row.current_phase)
        .bind(row.progress_percent)
        .bind(row.total_rows)
        .bind(row.processed_rows)
        .bind(row.valid_rows)
        .bind(row.error_rows)
        .bind(row.inserted_rows)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(row.processing_time_ms)
        .bind(&row.last_error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
