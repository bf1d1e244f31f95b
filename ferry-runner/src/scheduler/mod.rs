//! Scheduler layer for the runner
//!
//! This layer owns job concurrency: the worker pool that drives jobs from
//! Queued to a terminal state, and the registry through which running jobs
//! can be cancelled.

pub mod cancellation;
pub mod observer;
pub mod pool;

pub use cancellation::CancellationRegistry;
pub use pool::{PoolConfig, PoolError, WorkerPool};
