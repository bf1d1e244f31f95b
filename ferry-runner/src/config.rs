//! Runner configuration
//!
//! Defines all configurable parameters for the runner: HTTP bind address,
//! worker pool sizing, workspace location, log file and shutdown timeout.

use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::PoolConfig;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API listens on (e.g., "0.0.0.0:8080")
    pub bind_addr: String,

    /// Number of jobs executed concurrently
    pub worker_count: usize,

    /// Submitted jobs that can wait for a worker before submission blocks
    pub queue_capacity: usize,

    /// Directory under which per-job workspaces are created
    pub workspace_base: PathBuf,

    /// File that receives a copy of the logs; `None` logs to the console only
    pub log_file: Option<PathBuf>,

    /// How long shutdown waits for running jobs to wind down
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - BIND_ADDR (default: 0.0.0.0:8080)
    /// - WORKER_COUNT (default: 4)
    /// - QUEUE_CAPACITY (default: 64)
    /// - WORKSPACE_BASE (default: system temp dir)
    /// - LOG_FILE (default: ferry.log, empty to disable)
    /// - SHUTDOWN_TIMEOUT (seconds, default: 10)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = lookup("BIND_ADDR").unwrap_or(defaults.bind_addr);

        let worker_count = parse_var(&lookup, "WORKER_COUNT")?.unwrap_or(defaults.worker_count);

        let queue_capacity =
            parse_var(&lookup, "QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity);

        let workspace_base = lookup("WORKSPACE_BASE")
            .map(PathBuf::from)
            .unwrap_or(defaults.workspace_base);

        let log_file = match lookup("LOG_FILE") {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => defaults.log_file,
        };

        let shutdown_timeout = parse_var(&lookup, "SHUTDOWN_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.shutdown_timeout);

        Ok(Self {
            bind_addr,
            worker_count,
            queue_capacity,
            workspace_base,
            log_file,
            shutdown_timeout,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.worker_count == 0 {
            anyhow::bail!("worker_count must be greater than 0");
        }

        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }

        if !self.workspace_base.is_dir() {
            anyhow::bail!(
                "workspace_base {} is not a directory",
                self.workspace_base.display()
            );
        }

        if self.shutdown_timeout.is_zero() {
            anyhow::bail!("shutdown_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Worker pool sizing
    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            worker_count: self.worker_count,
            queue_capacity: self.queue_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            worker_count: 4,
            queue_capacity: 64,
            workspace_base: std::env::temp_dir(),
            log_file: Some(PathBuf::from("ferry.log")),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", key, raw, e))
        })
        .transpose()
}
