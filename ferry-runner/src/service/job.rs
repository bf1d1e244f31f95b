//! Job service
//!
//! Entry points used by the API: submit, look up and cancel jobs.

use ferry_core::domain::job::{Job, JobStatus};
use ferry_core::dto::job::SubmitJob;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::{JobRepository, RepositoryError};
use crate::scheduler::{PoolError, WorkerPool};

/// Service error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} is not running (current: {status})")]
    NotRunning { id: Uuid, status: JobStatus },

    #[error("{0}")]
    ValidationError(String),

    #[error("Runner is not accepting jobs: {0}")]
    Unavailable(PoolError),
}

impl From<RepositoryError> for JobError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => JobError::NotFound(id),
        }
    }
}

/// Ties the job store to the worker pool
pub struct JobService {
    store: Arc<dyn JobRepository>,
    pool: Arc<WorkerPool>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobRepository>, pool: Arc<WorkerPool>) -> Self {
        Self { store, pool }
    }

    /// Stores a new queued job and hands it to the pool
    pub async fn submit(&self, req: SubmitJob) -> Result<Job, JobError> {
        validate_submission(&req)?;

        if self.pool.is_shutting_down() {
            return Err(JobError::Unavailable(PoolError::ShuttingDown));
        }

        let job = req.into_job();
        self.store.save(job.clone());

        // A shutdown racing this call leaves the record Queued; nothing
        // will run it, which matches jobs still queued at shutdown.
        self.pool.submit(job.clone()).await.map_err(|e| {
            warn!("Job {} was stored but not queued: {}", job.id, e);
            JobError::Unavailable(e)
        })?;

        info!("Job {} submitted - repo: {}", job.id, job.repo_url);

        Ok(job)
    }

    /// Get a job by ID
    pub fn get(&self, id: Uuid) -> Result<Job, JobError> {
        Ok(self.store.get(id)?)
    }

    /// Requests cancellation of a running job
    pub fn cancel(&self, id: Uuid) -> Result<(), JobError> {
        if self.pool.cancel(id) {
            info!("Cancel requested for job {}", id);
            return Ok(());
        }

        let job = self.store.get(id)?;
        Err(JobError::NotRunning {
            id,
            status: job.status,
        })
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_submission(req: &SubmitJob) -> Result<(), JobError> {
    if req.steps.is_empty() {
        return Err(JobError::ValidationError(
            "At least one step is required".to_string(),
        ));
    }

    if let Some(idx) = req.steps.iter().position(|step| step.trim().is_empty()) {
        return Err(JobError::ValidationError(format!("Step {} is empty", idx + 1)));
    }

    Ok(())
}
