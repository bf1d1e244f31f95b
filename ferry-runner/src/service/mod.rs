//! Service layer
//!
//! Services contain the runner's business logic: executing jobs and the
//! submit/get/cancel entry points used by the HTTP API.
//!
//! Execution is trait-based so the worker pool can be tested with scripted
//! executions.

mod execution;
mod job;
mod log_buffer;

// Re-export traits
pub use execution::ExecutionService;

// Re-export implementations
pub use execution::ShellExecutionService;
pub use job::JobService;

pub use execution::{ExecutionError, ExecutionReport};
pub use job::JobError;
