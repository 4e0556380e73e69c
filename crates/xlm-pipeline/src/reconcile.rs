//! Reconciler service (C12, spec §4.11). Thin wrapper over
//! [`xlm_db::ReconcilerRepository`] that also marks the job terminal.

use xlm_db::{JobRepository, ReconcilerRepository, ReconciliationReport};
use xlm_model::{Job, JobStatus};

use crate::error::PipelineResult;

#[derive(Clone)]
pub struct ReconcileService {
    reconciler: ReconcilerRepository,
    jobs: JobRepository,
}

impl ReconcileService {
    pub fn new(reconciler: ReconcilerRepository, jobs: JobRepository) -> Self {
        Self { reconciler, jobs }
    }

    pub async fn reconcile(&self, job: &mut Job) -> PipelineResult<ReconciliationReport> {
        let report = self.reconciler.reconcile(&job.id).await?;

        job.completed_at = Some(chrono::Utc::now());
        job.status = if report.is_clean() { JobStatus::Completed } else { JobStatus::Failed };
        if !report.is_clean() {
            job.last_error = Some("reconciliation found inconsistencies, see sample_errors".to_string());
        }
        self.jobs.update(job).await?;

        Ok(report)
    }
}
