//! Step Tracker (C7). Process-local, in-memory, never persisted — a
//! `dashmap::DashMap` keyed by job id, modeled on the teacher's process-wide
//! state philosophy (the Type Introspection Cache in `xlm-reader` uses the
//! same shape).

use chrono::Utc;
use dashmap::DashMap;

use xlm_model::step::{StepState, StepStatus, ValidateStep, VALIDATE_STEPS_IN_ORDER};

/// Tracks per-job, per-step progress for the Validate phase (spec §4.7).
/// Other phases (Ingest/Apply/Reconcile) report coarser per-sheet progress
/// through `JobSheet` counters instead; only Validate has named sub-steps.
pub struct StepTracker {
    jobs: DashMap<String, Vec<StepStatus>>,
}

impl StepTracker {
    pub fn new() -> Self {
        Self { jobs: DashMap::new() }
    }

    /// Seeds all seven validate steps as `Pending` for a job.
    pub fn init_job(&self, job_id: &str) {
        let steps = VALIDATE_STEPS_IN_ORDER
            .iter()
            .map(|s| StepStatus::pending(*s))
            .collect();
        self.jobs.insert(job_id.to_string(), steps);
    }

    pub fn mark_started(&self, job_id: &str, step: ValidateStep) {
        if let Some(mut steps) = self.jobs.get_mut(job_id) {
            if let Some(status) = steps.iter_mut().find(|s| s.ordinal == step.ordinal()) {
                status.state = StepState::InProgress;
                status.start_time = Some(Utc::now());
            }
        }
    }

    pub fn mark_completed(&self, job_id: &str, step: ValidateStep, affected_rows: u64) {
        self.finish(job_id, step, StepState::Completed, Some(affected_rows), None);
    }

    pub fn mark_failed(&self, job_id: &str, step: ValidateStep, error: impl Into<String>) {
        self.finish(job_id, step, StepState::Failed, None, Some(error.into()));
    }

    pub fn mark_timeout(&self, job_id: &str, step: ValidateStep) {
        self.finish(
            job_id,
            step,
            StepState::Timeout,
            None,
            Some(format!("step exceeded its {}s timeout", step.default_timeout_secs())),
        );
    }

    fn finish(
        &self,
        job_id: &str,
        step: ValidateStep,
        state: StepState,
        affected_rows: Option<u64>,
        error: Option<String>,
    ) {
        if let Some(mut steps) = self.jobs.get_mut(job_id) {
            if let Some(status) = steps.iter_mut().find(|s| s.ordinal == step.ordinal()) {
                let end = Utc::now();
                status.state = state;
                status.end_time = Some(end);
                status.duration_ms = status
                    .start_time
                    .map(|start| (end - start).num_milliseconds());
                status.affected_rows = affected_rows;
                status.last_error = error;
            }
        }
    }

    /// Steps currently `InProgress` that have exceeded their timeout, marked
    /// `Timeout` in place and returned (spec §4.7 "timeout sweep").
    pub fn sweep_timeouts(&self, job_id: &str) -> Vec<ValidateStep> {
        let now = Utc::now();
        let mut timed_out = Vec::new();
        if let Some(mut steps) = self.jobs.get_mut(job_id) {
            for status in steps.iter_mut() {
                if status.is_timed_out(now) {
                    status.state = StepState::Timeout;
                    status.end_time = Some(now);
                    if let Some(step) = VALIDATE_STEPS_IN_ORDER.get(status.ordinal) {
                        timed_out.push(*step);
                    }
                }
            }
        }
        timed_out
    }

    pub fn snapshot(&self, job_id: &str) -> Option<Vec<StepStatus>> {
        self.jobs.get(job_id).map(|s| s.clone())
    }

    /// Fraction of the seven steps that reached `Completed`, in `[0, 1]`.
    pub fn progress_fraction(&self, job_id: &str) -> f32 {
        match self.jobs.get(job_id) {
            Some(steps) if !steps.is_empty() => {
                let completed = steps.iter().filter(|s| s.state == StepState::Completed).count();
                completed as f32 / steps.len() as f32
            }
            _ => 0.0,
        }
    }

    pub fn remove_job(&self, job_id: &str) {
        self.jobs.remove(job_id);
    }
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_tracks_completion_and_progress() {
        let tracker = StepTracker::new();
        tracker.init_job("job-1");
        assert_eq!(tracker.progress_fraction("job-1"), 0.0);

        for step in VALIDATE_STEPS_IN_ORDER {
            tracker.mark_started("job-1", step);
            tracker.mark_completed("job-1", step, 10);
        }
        assert_eq!(tracker.progress_fraction("job-1"), 1.0);

        let snapshot = tracker.snapshot("job-1").unwrap();
        assert!(snapshot.iter().all(|s| s.state == StepState::Completed));
    }

    #[test]
    fn unknown_job_reports_zero_progress() {
        let tracker = StepTracker::new();
        assert_eq!(tracker.progress_fraction("missing"), 0.0);
        assert!(tracker.snapshot("missing").is_none());
    }
}
