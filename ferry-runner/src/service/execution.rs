//! Execution service
//!
//! Runs the work described by a job:
//! - Creating a scratch workspace
//! - Cloning the repository and checking out the requested commit
//! - Running each step with `sh -c`, in order, stopping at the first failure
//!
//! Every command races against the job's cancellation token. When the token
//! fires the running child is killed and the execution returns promptly.

use async_trait::async_trait;
use ferry_core::domain::job::Job;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::service::log_buffer::LogBuffer;

/// Errors reported by an execution
///
/// Whether a failed execution counts as a cancellation is decided by the
/// caller from the job's token, never from these variants.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to create workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("step failed: {0}")]
    StepFailed(String),

    #[error("execution interrupted")]
    Interrupted,

    #[error("execution panicked")]
    Panicked,
}

/// Output and outcome of one execution
#[derive(Debug)]
pub struct ExecutionReport {
    pub logs: String,
    pub outcome: Result<(), ExecutionError>,
}

impl ExecutionReport {
    pub fn success(logs: String) -> Self {
        Self {
            logs,
            outcome: Ok(()),
        }
    }

    pub fn failure(logs: String, error: ExecutionError) -> Self {
        Self {
            logs,
            outcome: Err(error),
        }
    }
}

/// Service trait for executing jobs
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Executes a job
    ///
    /// Implementations must watch `cancel` and return promptly once it
    /// fires. The returned logs are stored on the job as-is.
    async fn execute_job(&self, cancel: CancellationToken, job: Job) -> ExecutionReport;
}

/// Runs jobs as local processes (`git` and `sh`)
pub struct ShellExecutionService {
    workspace_base: PathBuf,
}

impl ShellExecutionService {
    /// Creates a new shell execution service
    ///
    /// # Arguments
    /// * `workspace_base` - Directory under which per-job workspaces are created
    pub fn new(workspace_base: PathBuf) -> Self {
        Self { workspace_base }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        job: &Job,
        logs: &mut LogBuffer,
    ) -> Result<(), ExecutionError> {
        // Removed on drop, whatever the outcome
        let workspace = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.workspace_base)
            .map_err(ExecutionError::Workspace)?;
        let dir = workspace.path();

        debug!("Job {} workspace: {}", job.id, dir.display());

        if !job.repo_url.is_empty() {
            let mut clone = Command::new("git");
            clone.arg("clone").arg(&job.repo_url).arg(dir);
            run_command(cancel, clone, &format!("git clone {}", job.repo_url), logs).await?;
        }

        if !job.commit.is_empty() {
            let mut checkout = Command::new("git");
            checkout.arg("checkout").arg(&job.commit);
            run_in(cancel, checkout, dir, &format!("git checkout {}", job.commit), logs).await?;
        }

        for step in &job.steps {
            let mut shell = Command::new("sh");
            shell.arg("-c").arg(step);
            match run_in(cancel, shell, dir, step, logs).await {
                Err(ExecutionError::CommandFailed { .. }) => {
                    return Err(ExecutionError::StepFailed(step.clone()));
                }
                other => other?,
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ExecutionService for ShellExecutionService {
    async fn execute_job(&self, cancel: CancellationToken, job: Job) -> ExecutionReport {
        let mut logs = LogBuffer::new();
        match self.run(&cancel, &job, &mut logs).await {
            Ok(()) => ExecutionReport::success(logs.into_string()),
            Err(e) => {
                debug!("Job {} execution ended with error: {}", job.id, e);
                ExecutionReport::failure(logs.into_string(), e)
            }
        }
    }
}

async fn run_in(
    cancel: &CancellationToken,
    mut command: Command,
    dir: &Path,
    display: &str,
    logs: &mut LogBuffer,
) -> Result<(), ExecutionError> {
    command.current_dir(dir);
    run_command(cancel, command, display, logs).await
}

/// Runs one command to completion, or kills it when `cancel` fires
async fn run_command(
    cancel: &CancellationToken,
    mut command: Command,
    display: &str,
    logs: &mut LogBuffer,
) -> Result<(), ExecutionError> {
    if cancel.is_cancelled() {
        return Err(ExecutionError::Interrupted);
    }

    logs.push_line(&format!("$ {display}"));

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let spawn_error = |source| ExecutionError::Spawn {
        command: display.to_string(),
        source,
    };

    let child = command.spawn().map_err(spawn_error)?;

    // Dropping the wait future drops the child, which kills it
    let output = tokio::select! {
        output = child.wait_with_output() => output.map_err(spawn_error)?,
        _ = cancel.cancelled() => return Err(ExecutionError::Interrupted),
    };

    logs.push_output(&output.stdout);
    logs.push_output(&output.stderr);

    if output.status.success() {
        Ok(())
    } else {
        Err(ExecutionError::CommandFailed {
            command: display.to_string(),
            status: output.status,
        })
    }
}
