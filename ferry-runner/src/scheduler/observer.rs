//! Job lifecycle observers
//!
//! The worker pool reports every persisted transition to an observer passed
//! in at construction instead of logging through global state.

use ferry_core::domain::job::{Job, JobStatus};
use tracing::{error, info, warn};

/// Receives job lifecycle events from the worker pool
pub trait JobObserver: Send + Sync {
    /// Called after the job has been stored as Running
    fn job_started(&self, job: &Job);

    /// Called after the job's terminal state has been stored
    fn job_finished(&self, job: &Job);
}

/// Observer that emits `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn job_started(&self, job: &Job) {
        info!(
            job_id = %job.id,
            repo = %job.repo_url,
            commit = %job.commit,
            "Job started"
        );
    }

    fn job_finished(&self, job: &Job) {
        match job.status {
            JobStatus::Completed => info!(job_id = %job.id, "Job completed successfully"),
            JobStatus::Canceled => info!(job_id = %job.id, "Job canceled"),
            JobStatus::Failed => error!(job_id = %job.id, error = %job.error, "Job failed"),
            status => warn!(job_id = %job.id, %status, "Job finished in non-terminal state"),
        }
    }
}
