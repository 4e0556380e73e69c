//! Validator repository (C10, spec §4.9). Seven ordered, single-statement
//! SQL rules. Each method executes exactly one bulk statement and returns
//! its affected-row count; the caller (xlm-pipeline's Validator) is
//! responsible for Step Tracker bookkeeping and timeout checks around each
//! call.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::DbError;

#[derive(Clone)]
pub struct ValidatorRepository {
    pool: PgPool,
}

/// A reference-column check: the raw field holding the business name/code
/// and the master table/column it must resolve against (spec §4.9 rule 5).
/// `value_transform` is a SQL expression template with a `{expr}` placeholder,
/// applied on both sides of the join so the comparison matches however the
/// applier (C11) derived the master row's code (e.g. `"upper({expr})"` for a
/// plain uppercase code, `"upper(replace({expr}, ' ', '_'))"` for doc_type's
/// space-to-underscore derivation).
pub struct ReferenceCheck<'a> {
    pub field: &'a str,
    pub master_table: &'a str,
    pub master_code_column: &'a str,
    pub value_transform: &'a str,
}

impl<'a> ReferenceCheck<'a> {
    pub fn uppercase(field: &'a str, master_table: &'a str, master_code_column: &'a str) -> Self {
        Self { field, master_table, master_code_column, value_transform: "upper({expr})" }
    }
}

impl ValidatorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, DbError> {
        Ok(self.pool.begin().await?)
    }

    /// Rule 1: required fields. One `StagingError` per offending raw row,
    /// using a `CASE` chain to identify the first missing column (spec §4.9
    /// rule 1: "emit one row per offending raw row, not per missing column").
    pub async fn check_required_fields(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
        required_fields: &[&str],
    ) -> Result<u64, DbError> {
        if required_fields.is_empty() {
            return Ok(0);
        }
        let field_case_chain = required_fields
            .iter()
            .map(|f| {
                format!(
                    "WHEN (normalized_fields->>'{f}') IS NULL OR btrim(normalized_fields->>'{f}') = '' THEN '{f}'",
                    f = f
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        // Mirrors `field_case_chain`'s condition order so `error_value` carries
        // the same offending column's *raw* (pre-normalization) value (spec §8
        // scenario 3: `error_value=<raw ma_thung>`).
        let value_case_chain = required_fields
            .iter()
            .map(|f| {
                format!(
                    "WHEN (normalized_fields->>'{f}') IS NULL OR btrim(normalized_fields->>'{f}') = '' THEN fields->>'{f}'",
                    f = f
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let where_clause = required_fields
            .iter()
            .map(|f| format!("(normalized_fields->>'{f}') IS NULL OR btrim(normalized_fields->>'{f}') = ''", f = f))
            .collect::<Vec<_>>()
            .join(" OR ");

        let sql = format!(
            r#"
            INSERT INTO staging_error (job_id, sheet_name, row_num, error_type, error_field, error_value, error_message, original_data, created_at)
            SELECT job_id, sheet_name, row_num, 'REQUIRED_MISSING',
                   CASE {field_case_chain} ELSE '' END,
                   CASE {value_case_chain} ELSE NULL END,
                   $2, fields::text, now()
            FROM staging_raw
            WHERE job_id = $1 AND ({where_clause})
            "#
        );
        let result = sqlx::query(&sql)
            .bind(job_id)
            .bind(xlm_model::REQUIRED_FIELD_MISSING_MESSAGE)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    /// Rule 2: date formats. Skips rows already in error (left-anti-join on
    /// (job_id, row_num)).
    pub async fn check_date_formats(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
        date_fields: &[&str],
    ) -> Result<u64, DbError> {
        let mut total = 0u64;
        for field in date_fields {
            let sql = format!(
                r#"
                INSERT INTO staging_error (job_id, sheet_name, row_num, error_type, error_field, error_value, error_message, original_data, created_at)
                SELECT r.job_id, r.sheet_name, r.row_num, 'INVALID_DATE', '{field}',
                       r.normalized_fields->>'{field}', 'value does not match YYYY-MM-DD', r.fields::text, now()
                FROM staging_raw r
                LEFT JOIN staging_error e
                  ON e.job_id = r.job_id AND e.row_num = r.row_num AND e.sheet_name = r.sheet_name
                WHERE r.job_id = $1 AND e.row_num IS NULL
                  AND (r.normalized_fields->>'{field}') IS NOT NULL
                  AND btrim(r.normalized_fields->>'{field}') <> ''
                  AND (r.normalized_fields->>'{field}') !~ '^\d{{4}}-\d{{2}}-\d{{2}}$'
                "#,
                field = field
            );
            let result = sqlx::query(&sql).bind(job_id).execute(&mut **tx).await?;
            total += result.rows_affected();
        }
        Ok(total)
    }

    /// Rule 3: positive-integer numerics. Skips rows already in error.
    pub async fn check_numerics(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
        integer_fields: &[&str],
    ) -> Result<u64, DbError> {
        let mut total = 0u64;
        for field in integer_fields {
            let sql = format!(
                r#"
                INSERT INTO staging_error (job_id, sheet_name, row_num, error_type, error_field, error_value, error_message, original_data, created_at)
                SELECT r.job_id, r.sheet_name, r.row_num, 'INVALID_NUMERIC', '{field}',
                       r.normalized_fields->>'{field}', 'value is not a positive integer', r.fields::text, now()
                FROM staging_raw r
                LEFT JOIN staging_error e
                  ON e.job_id = r.job_id AND e.row_num = r.row_num AND e.sheet_name = r.sheet_name
                WHERE r.job_id = $1 AND e.row_num IS NULL
                  AND (r.normalized_fields->>'{field}') !~ '^[1-9][0-9]*$'
                "#,
                field = field
            );
            let result = sqlx::query(&sql).bind(job_id).execute(&mut **tx).await?;
            total += result.rows_affected();
        }
        Ok(total)
    }

    /// Rule 4: in-file duplicates, windowed by the business key
    /// (unit_code, box_code, doc_date, quantity). Skips already-errored
    /// rows.
    pub async fn check_in_file_duplicates(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            WITH ranked AS (
                SELECT r.job_id, r.sheet_name, r.row_num, r.fields,
                       row_number() OVER (
                           PARTITION BY normalized_fields->>'unit_code',
                                        normalized_fields->>'box_code',
                                        normalized_fields->>'doc_date',
                                        normalized_fields->>'quantity'
                           ORDER BY r.row_num
                       ) AS rn,
                       first_value(r.row_num) OVER (
                           PARTITION BY normalized_fields->>'unit_code',
                                        normalized_fields->>'box_code',
                                        normalized_fields->>'doc_date',
                                        normalized_fields->>'quantity'
                           ORDER BY r.row_num
                       ) AS first_row
                FROM staging_raw r
                LEFT JOIN staging_error e
                  ON e.job_id = r.job_id AND e.row_num = r.row_num AND e.sheet_name = r.sheet_name
                WHERE r.job_id = $1 AND e.row_num IS NULL
            )
            INSERT INTO staging_error (job_id, sheet_name, row_num, error_type, error_field, error_value, error_message, original_data, created_at)
            SELECT job_id, sheet_name, row_num, 'DUP_IN_FILE', 'unit_code,box_code,doc_date,quantity',
                   NULL, format('duplicate of row %s', first_row), fields::text, now()
            FROM ranked WHERE rn > 1
        "#;
        let result = sqlx::query(sql).bind(job_id).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// Rule 5: master references. Uses `LEFT JOIN … WHERE master.id IS NULL`
    /// per the spec's explicit index-efficiency note (not `NOT EXISTS`).
    pub async fn check_master_references(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
        checks: &[ReferenceCheck<'_>],
    ) -> Result<u64, DbError> {
        let mut total = 0u64;
        for check in checks {
            let row_expr = check
                .value_transform
                .replace("{expr}", &format!("r.normalized_fields->>'{}'", check.field));
            let master_expr = check
                .value_transform
                .replace("{expr}", &format!("m.{}", check.master_code_column));
            let sql = format!(
                r#"
                INSERT INTO staging_error (job_id, sheet_name, row_num, error_type, error_field, error_value, error_message, original_data, created_at)
                SELECT r.job_id, r.sheet_name, r.row_num, 'REF_NOT_FOUND', '{field}',
                       r.normalized_fields->>'{field}', 'no matching active master record', r.fields::text, now()
                FROM staging_raw r
                LEFT JOIN staging_error e
                  ON e.job_id = r.job_id AND e.row_num = r.row_num AND e.sheet_name = r.sheet_name
                LEFT JOIN {master_table} m ON {master_expr} = {row_expr} AND m.is_active
                WHERE r.job_id = $1 AND e.row_num IS NULL AND {master_expr} IS NULL
                "#,
                field = check.field,
                master_table = check.master_table,
                master_expr = master_expr,
                row_expr = row_expr,
            );
            let result = sqlx::query(&sql).bind(job_id).execute(&mut **tx).await?;
            total += result.rows_affected();
        }
        Ok(total)
    }

    /// Rule 6: DB duplicates against existing `case_detail` rows (joined via
    /// unit and box codes). Skips already-errored rows.
    pub async fn check_db_duplicates(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO staging_error (job_id, sheet_name, row_num, error_type, error_field, error_value, error_message, original_data, created_at)
            SELECT r.job_id, r.sheet_name, r.row_num, 'DUP_IN_DB', 'unit_code,box_code',
                   NULL, 'business key already exists in case_detail', r.fields::text, now()
            FROM staging_raw r
            LEFT JOIN staging_error e
              ON e.job_id = r.job_id AND e.row_num = r.row_num AND e.sheet_name = r.sheet_name
            WHERE r.job_id = $1 AND e.row_num IS NULL
              AND EXISTS (
                  SELECT 1 FROM case_detail c
                  WHERE c.unit_code = r.normalized_fields->>'unit_code'
                    AND c.box_code = r.normalized_fields->>'box_code'
              )
        "#;
        let result = sqlx::query(sql).bind(job_id).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// Rule 7: promote error-free rows into `staging_valid`, casting
    /// normalized strings to target SQL types.
    pub async fn promote_to_valid(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: &str,
    ) -> Result<u64, DbError> {
        let sql = r#"
            INSERT INTO staging_valid (job_id, sheet_name, row_num, fields, created_at)
            SELECT r.job_id, r.sheet_name, r.row_num, r.normalized_fields, now()
            FROM staging_raw r
            LEFT JOIN staging_error e
              ON e.job_id = r.job_id AND e.row_num = r.row_num AND e.sheet_name = r.sheet_name
            WHERE r.job_id = $1 AND e.row_num IS NULL AND r.parse_errors IS NULL
        "#;
        let result = sqlx::query(sql).bind(job_id).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}
