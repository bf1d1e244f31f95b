//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error message recorded on jobs that ended because their token fired
pub const CANCELED_MESSAGE: &str = "job canceled";

/// Job execution record
///
/// Created by the submission path in `Queued` state and then advanced by the
/// single worker that owns it. Status changes go through the transition
/// methods below so a terminal job can never move again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub repo_url: String,
    pub commit: String,
    pub steps: Vec<String>,
    pub status: JobStatus,
    pub logs: String,
    pub error: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl JobStatus {
    /// Completed, Failed and Canceled are final
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Job {
    /// Creates a queued job with a fresh identifier
    pub fn new(repo_url: String, commit: String, steps: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_url,
            commit,
            steps,
            status: JobStatus::Queued,
            logs: String::new(),
            error: String::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Queued -> Running
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Running -> Completed
    pub fn complete(&mut self, logs: String) -> Result<(), TransitionError> {
        self.finish(JobStatus::Completed, logs, String::new())
    }

    /// Running -> Failed, recording the provider's error message
    pub fn fail(&mut self, logs: String, error: impl Into<String>) -> Result<(), TransitionError> {
        self.finish(JobStatus::Failed, logs, error.into())
    }

    /// Running -> Canceled
    pub fn cancel(&mut self, logs: String) -> Result<(), TransitionError> {
        self.finish(JobStatus::Canceled, logs, CANCELED_MESSAGE.to_string())
    }

    fn finish(
        &mut self,
        status: JobStatus,
        logs: String,
        error: String,
    ) -> Result<(), TransitionError> {
        self.transition(status)?;
        self.logs = logs;
        self.error = error;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
