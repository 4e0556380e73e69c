//! End-to-end Apply → Reconcile integration test against a real Postgres
//! instance (spec §4.10/§4.11, §8). Skipped when `DATABASE_URL` isn't set.

use xlm_db::{connect, DbContext};
use xlm_model::Job;

fn get_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

#[tokio::test]
async fn apply_then_reconcile_reports_clean_for_a_consistent_row() {
    let Some(database_url) = get_database_url() else {
        eprintln!("Skipping apply_then_reconcile_reports_clean_for_a_consistent_row — DATABASE_URL not set");
        return;
    };

    let pool = connect(&database_url).await.unwrap();
    let db = DbContext::new(pool);
    db.migrate().await.unwrap();

    let job_id = format!("test-job-{}", uuid::Uuid::new_v4());
    let job = {
        let mut job = Job::new("reconcile_test.xlsx", "test-harness");
        job.id = job_id.clone();
        job
    };
    db.jobs.insert(&job).await.unwrap();

    let fields = serde_json::json!({
        "warehouse_code": "WHRC",
        "unit_code": "URC",
        "doc_type_name": "Invoice",
        "box_code": "BRC",
        "location_area": "A",
        "location_row": "1",
        "location_col": "1",
        "retention_period": "7Y",
        "case_pdm_status": "OPEN",
        "box_status": "ACTIVE",
        "box_state": "SEALED",
        "doc_date": "2026-01-01",
        "quantity": "5",
        "due_date": "2026-02-01",
        "handover_date": "2026-03-01",
    });
    sqlx::query(
        "INSERT INTO staging_valid (job_id, sheet_name, row_num, fields, created_at) \
         VALUES ($1, 'Sheet1', 1, $2, now())",
    )
    .bind(&job_id)
    .bind(&fields)
    .execute(&db.pool)
    .await
    .unwrap();

    let mut tx = db.applier.begin().await.unwrap();
    db.applier.apply_warehouses(&mut tx, &job_id).await.unwrap();
    db.applier.apply_units(&mut tx, &job_id).await.unwrap();
    db.applier.apply_doc_types(&mut tx, &job_id).await.unwrap();
    db.applier
        .apply_statuses(&mut tx, &job_id, "CASE_PDM", "case_pdm_status")
        .await
        .unwrap();
    db.applier
        .apply_statuses(&mut tx, &job_id, "BOX_STATUS", "box_status")
        .await
        .unwrap();
    db.applier
        .apply_statuses(&mut tx, &job_id, "BOX_STATE", "box_state")
        .await
        .unwrap();
    db.applier.apply_retention_periods(&mut tx, &job_id).await.unwrap();
    db.applier.apply_locations(&mut tx, &job_id).await.unwrap();
    db.applier.apply_boxes(&mut tx, &job_id).await.unwrap();
    db.applier.apply_case_details(&mut tx, &job_id).await.unwrap();
    tx.commit().await.unwrap();

    let report = db.reconciler.reconcile(&job_id).await.unwrap();
    assert_eq!(report.staging_valid_count, 1);
    assert_eq!(report.case_detail_count, 1);
    assert!(report.is_clean(), "a fully-applied consistent row must reconcile clean: {:?}", report);

    // cleanup
    sqlx::query("DELETE FROM case_detail WHERE job_id = $1")
        .bind(&job_id)
        .execute(&db.pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM box WHERE code = 'BRC'").execute(&db.pool).await.unwrap();
    sqlx::query("DELETE FROM location WHERE area = 'A'").execute(&db.pool).await.unwrap();
    sqlx::query("DELETE FROM warehouse WHERE code = 'WHRC'").execute(&db.pool).await.unwrap();
    sqlx::query("DELETE FROM unit WHERE code = 'URC'").execute(&db.pool).await.unwrap();
    sqlx::query("DELETE FROM doc_type WHERE code = 'INVOICE'").execute(&db.pool).await.unwrap();
    sqlx::query("DELETE FROM retention_period WHERE code = '7Y'").execute(&db.pool).await.unwrap();
    sqlx::query("DELETE FROM status WHERE partition IN ('CASE_PDM', 'BOX_STATUS', 'BOX_STATE')")
        .execute(&db.pool)
        .await
        .unwrap();
    db.staging.cleanup(&job_id, false).await.unwrap();
    sqlx::query("DELETE FROM job WHERE id = $1")
        .bind(&job_id)
        .execute(&db.pool)
        .await
        .unwrap();
}
