//! Repository layer
//!
//! Repositories own job state. The runner keeps everything in memory for
//! the lifetime of the process; there is no persistence across restarts.
//!
//! Repositories are trait-based so the worker pool and the API can be
//! tested against the same abstraction.

mod jobs;

pub use jobs::{InMemoryJobRepository, JobRepository, RepositoryError};
