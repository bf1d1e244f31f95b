//! Jobs repository
//!
//! Keyed storage of job records shared by the API (reads, initial save)
//! and the worker pool (status updates).

use ferry_core::domain::job::Job;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by job repositories
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("job {0} not found")]
    NotFound(Uuid),
}

/// Repository trait for job records
///
/// All operations are linearizable: a `get` observes every `save`/`update`
/// that completed before it.
pub trait JobRepository: Send + Sync {
    /// Inserts or overwrites the record stored under `job.id`
    fn save(&self, job: Job);

    /// Returns an independent copy of the record
    fn get(&self, id: Uuid) -> Result<Job, RepositoryError>;

    /// Publishes a status transition; same semantics as `save`
    fn update(&self, job: Job);
}

/// In-memory implementation of JobRepository
///
/// A single read/write lock guards the whole map. Records are plain values,
/// so a poisoned lock still holds consistent data and is recovered.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobRepository {
    /// Creates an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, job: Job) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(job.id, job);
    }
}

impl JobRepository for InMemoryJobRepository {
    fn save(&self, job: Job) {
        self.put(job);
    }

    fn get(&self, id: Uuid) -> Result<Job, RepositoryError> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).cloned().ok_or(RepositoryError::NotFound(id))
    }

    fn update(&self, job: Job) {
        self.put(job);
    }
}
