//! Applier repository (C11, spec §4.10). Three phases of conditional
//! inserts; every statement is `INSERT … SELECT DISTINCT … WHERE NOT EXISTS`,
//! so rerunning Apply against the same `staging_valid` yields no new rows.
//!
//! Every statement below deduplicates on the business key *before* attaching
//! `gen_random_uuid()` — a fresh UUID inside a `SELECT DISTINCT` list would
//! make every row distinct regardless of the key, defeating the dedup and
//! trying (and failing) to insert one row per `staging_valid` occurrence of
//! a code that already has a `UNIQUE` constraint on it.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::DbError;

#[derive(Clone)]
pub struct ApplierRepository {
    pool: PgPool,
}

impl ApplierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, DbError> {
        Ok(self.pool.begin().await?)
    }

    // ---- P1: independent masters ----

    pub async fn apply_warehouses(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO warehouse (id, code, name, is_active, created_at)
            SELECT gen_random_uuid(), sub.code, sub.name, true, now()
            FROM (
                SELECT DISTINCT upper(fields->>'warehouse_code') AS code,
                       fields->>'warehouse_code' AS name
                FROM staging_valid
                WHERE job_id = $1
            ) sub
            WHERE NOT EXISTS (SELECT 1 FROM warehouse w WHERE w.code = sub.code)
        "#;
        Ok(sqlx::query(sql).bind(job_id).execute(&mut **tx).await?.rows_affected())
    }

    pub async fn apply_units(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO unit (id, code, name, is_active, created_at)
            SELECT gen_random_uuid(), sub.code, sub.name, true, now()
            FROM (
                SELECT DISTINCT upper(fields->>'unit_code') AS code, fields->>'unit_code' AS name
                FROM staging_valid
                WHERE job_id = $1
            ) sub
            WHERE NOT EXISTS (SELECT 1 FROM unit u WHERE u.code = sub.code)
        "#;
        Ok(sqlx::query(sql).bind(job_id).execute(&mut **tx).await?.rows_affected())
    }

    /// Code derived by uppercasing and substituting spaces with underscores
    /// (spec §4.10 P1).
    pub async fn apply_doc_types(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO doc_type (id, code, name, is_active, created_at)
            SELECT gen_random_uuid(), sub.code, sub.name, true, now()
            FROM (
                SELECT DISTINCT upper(replace(fields->>'doc_type_name', ' ', '_')) AS code,
                       fields->>'doc_type_name' AS name
                FROM staging_valid
                WHERE job_id = $1
            ) sub
            WHERE NOT EXISTS (SELECT 1 FROM doc_type d WHERE d.code = sub.code)
        "#;
        Ok(sqlx::query(sql).bind(job_id).execute(&mut **tx).await?.rows_affected())
    }

    /// Unknown status codes fall back to `UNKNOWN` (spec §4.10 P1).
    pub async fn apply_statuses(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
        partition: &str,
        field: &str,
    ) -> Result<u64, DbError> {
        let sql = format!(
            r#"
            INSERT INTO status (id, partition, code, name, is_active, created_at)
            SELECT gen_random_uuid(), $2, sub.code, sub.name, true, now()
            FROM (
                SELECT DISTINCT
                       COALESCE(NULLIF(upper(fields->>'{field}'), ''), 'UNKNOWN') AS code,
                       COALESCE(fields->>'{field}', 'UNKNOWN') AS name
                FROM staging_valid
                WHERE job_id = $1
            ) sub
            WHERE NOT EXISTS (
                SELECT 1 FROM status s WHERE s.partition = $2 AND s.code = sub.code
            )
            "#,
            field = field
        );
        Ok(sqlx::query(&sql)
            .bind(job_id)
            .bind(partition)
            .execute(&mut **tx)
            .await?
            .rows_affected())
    }

    pub async fn apply_retention_periods(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO retention_period (id, code, name, is_active, created_at)
            SELECT gen_random_uuid(), sub.code, sub.name, true, now()
            FROM (
                SELECT DISTINCT upper(fields->>'retention_period') AS code,
                       fields->>'retention_period' AS name
                FROM staging_valid
                WHERE job_id = $1 AND fields->>'retention_period' IS NOT NULL
            ) sub
            WHERE NOT EXISTS (SELECT 1 FROM retention_period r WHERE r.code = sub.code)
        "#;
        Ok(sqlx::query(sql).bind(job_id).execute(&mut **tx).await?.rows_affected())
    }

    // ---- P2: dependent masters ----

    /// Needs an (area, row, col) tuple (spec §4.10 P2).
    pub async fn apply_locations(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO location (id, area, row_code, col_code, warehouse_id, is_active, created_at)
            SELECT gen_random_uuid(), sub.area, sub.row_code, sub.col_code, sub.warehouse_id, true, now()
            FROM (
                SELECT DISTINCT
                       sv.fields->>'location_area' AS area,
                       sv.fields->>'location_row' AS row_code,
                       sv.fields->>'location_col' AS col_code,
                       w.id AS warehouse_id
                FROM staging_valid sv
                JOIN warehouse w ON w.code = upper(sv.fields->>'warehouse_code')
                WHERE sv.job_id = $1
            ) sub
            WHERE NOT EXISTS (
                SELECT 1 FROM location l
                WHERE l.area = sub.area
                  AND l.row_code = sub.row_code
                  AND l.col_code = sub.col_code
                  AND l.warehouse_id = sub.warehouse_id
            )
        "#;
        Ok(sqlx::query(sql).bind(job_id).execute(&mut **tx).await?.rows_affected())
    }

    /// Joins warehouse, location, two status rows (box_status, box_state).
    pub async fn apply_boxes(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO box (id, code, warehouse_id, location_id, box_status_id, box_state_id, is_active, created_at)
            SELECT gen_random_uuid(), sub.code, sub.warehouse_id, sub.location_id,
                   sub.box_status_id, sub.box_state_id, true, now()
            FROM (
                SELECT DISTINCT upper(sv.fields->>'box_code') AS code,
                       w.id AS warehouse_id, l.id AS location_id, bs.id AS box_status_id, bst.id AS box_state_id
                FROM staging_valid sv
                JOIN warehouse w ON w.code = upper(sv.fields->>'warehouse_code')
                JOIN location l ON l.area = sv.fields->>'location_area'
                               AND l.row_code = sv.fields->>'location_row'
                               AND l.col_code = sv.fields->>'location_col'
                               AND l.warehouse_id = w.id
                LEFT JOIN status bs ON bs.partition = 'BOX_STATUS'
                                    AND bs.code = COALESCE(NULLIF(upper(sv.fields->>'box_status'), ''), 'UNKNOWN')
                LEFT JOIN status bst ON bst.partition = 'BOX_STATE'
                                     AND bst.code = COALESCE(NULLIF(upper(sv.fields->>'box_state'), ''), 'UNKNOWN')
                WHERE sv.job_id = $1
            ) sub
            WHERE NOT EXISTS (SELECT 1 FROM box b WHERE b.code = sub.code)
        "#;
        Ok(sqlx::query(sql).bind(job_id).execute(&mut **tx).await?.rows_affected())
    }

    // ---- P3: business rows ----

    /// Joins unit, doc_type, box, retention_period, three status refs;
    /// nullable reference joins use LEFT JOIN (spec §4.10 P3).
    pub async fn apply_case_details(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO case_detail (
                id, job_id, unit_id, doc_type_id, box_id, retention_period_id,
                case_pdm_status_id, box_status_id, box_state_id,
                unit_code, box_code, doc_date, quantity, due_date, handover_date, created_at
            )
            SELECT gen_random_uuid(), sub.job_id, sub.unit_id, sub.doc_type_id, sub.box_id, sub.retention_period_id,
                   sub.case_pdm_status_id, sub.box_status_id, sub.box_state_id,
                   sub.unit_code, sub.box_code, sub.doc_date, sub.quantity, sub.due_date, sub.handover_date, now()
            FROM (
                SELECT DISTINCT sv.job_id, u.id AS unit_id, d.id AS doc_type_id, b.id AS box_id, rp.id AS retention_period_id,
                       cps.id AS case_pdm_status_id, bs.id AS box_status_id, bst.id AS box_state_id,
                       upper(sv.fields->>'unit_code') AS unit_code, upper(sv.fields->>'box_code') AS box_code,
                       (sv.fields->>'doc_date')::date AS doc_date, (sv.fields->>'quantity')::bigint AS quantity,
                       (sv.fields->>'due_date')::date AS due_date, (sv.fields->>'handover_date')::date AS handover_date
                FROM staging_valid sv
                JOIN unit u ON u.code = upper(sv.fields->>'unit_code')
                JOIN doc_type d ON d.code = upper(replace(sv.fields->>'doc_type_name', ' ', '_'))
                JOIN box b ON b.code = upper(sv.fields->>'box_code')
                LEFT JOIN retention_period rp ON rp.code = upper(sv.fields->>'retention_period')
                LEFT JOIN status cps ON cps.partition = 'CASE_PDM'
                                     AND cps.code = COALESCE(NULLIF(upper(sv.fields->>'case_pdm_status'), ''), 'UNKNOWN')
                LEFT JOIN status bs ON bs.partition = 'BOX_STATUS' AND bs.id = b.box_status_id
                LEFT JOIN status bst ON bst.partition = 'BOX_STATE' AND bst.id = b.box_state_id
                WHERE sv.job_id = $1
            ) sub
            WHERE NOT EXISTS (
                SELECT 1 FROM case_detail c
                WHERE c.unit_code = sub.unit_code AND c.box_code = sub.box_code
            )
        "#;
        Ok(sqlx::query(sql).bind(job_id).execute(&mut **tx).await?.rows_affected())
    }
}
