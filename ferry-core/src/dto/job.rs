//! Job DTOs for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};

/// Request to submit a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJob {
    pub repo_url: String,
    #[serde(default)]
    pub commit: String,
    pub steps: Vec<String>,
}

impl SubmitJob {
    /// Builds the queued record for this submission
    pub fn into_job(self) -> Job {
        Job::new(self.repo_url, self.commit, self.steps)
    }
}

/// Reply to a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

impl From<&Job> for SubmitJobResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
        }
    }
}

/// Reply to an accepted cancellation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelJobResponse {
    pub job_id: Uuid,
    pub status: String,
}

impl CancelJobResponse {
    pub fn requested(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: "cancel_requested".to_string(),
        }
    }
}
