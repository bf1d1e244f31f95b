//! Ferry Runner
//!
//! Accepts CI jobs over HTTP (a repository, a commit and a list of shell
//! steps) and executes them on a bounded pool of workers.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repository: In-memory job store, the source of truth for job state
//! - Scheduler: Worker pool, cancellation registry and lifecycle observer
//! - Services: Job execution (git + sh) and the submit/get/cancel entry points
//! - API: axum router over the job service
//!
//! State lives in memory only; restarting the runner forgets every job.

mod api;
mod config;
mod repository;
mod scheduler;
mod service;
mod shutdown;

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repository::{InMemoryJobRepository, JobRepository};
use crate::scheduler::{CancellationRegistry, WorkerPool};
use crate::service::{ExecutionService, JobService, ShellExecutionService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    init_tracing(&config)?;

    info!("Starting Ferry Runner");
    info!(
        "Loaded configuration: bind_addr={}, workers={}, queue_capacity={}, workspace_base={}",
        config.bind_addr,
        config.worker_count,
        config.queue_capacity,
        config.workspace_base.display()
    );

    let store: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
    let registry = Arc::new(CancellationRegistry::new());
    let execution_service: Arc<dyn ExecutionService> =
        Arc::new(ShellExecutionService::new(config.workspace_base.clone()));

    let shutdown = shutdown::install_shutdown_handler();

    let pool = Arc::new(WorkerPool::new(
        config.pool(),
        Arc::clone(&store),
        registry,
        execution_service,
        shutdown.clone(),
    ));
    pool.start()?;

    let job_service = Arc::new(JobService::new(store, Arc::clone(&pool)));
    let app = api::create_router(job_service);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on {}", config.bind_addr);

    let server =
        axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    if let Err(e) = server.await {
        // Make sure workers stop even if the server died on its own
        pool.shutdown();
        return Err(e).context("HTTP server failed");
    }

    info!("Shutting down...");
    pool.shutdown();

    if tokio::time::timeout(config.shutdown_timeout, pool.join())
        .await
        .is_err()
    {
        warn!(
            "Workers did not stop within {:?}, exiting anyway",
            config.shutdown_timeout
        );
    }

    info!("Ferry Runner stopped");
    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

/// Console logging, plus a plain-text copy in the configured log file
fn init_tracing(config: &Config) -> Result<()> {
    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_runner=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}
