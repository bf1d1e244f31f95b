//! Worker pool
//!
//! A fixed number of workers share one job queue. Each worker takes one job
//! at a time and drives it through its lifecycle:
//!
//! 1. Queued -> Running, stored before anything else happens
//! 2. A child of the pool's shutdown token is registered as the job's
//!    cancellation handle
//! 3. The execution service runs the job with that token
//! 4. The handle is removed and the outcome is stored as Completed, Failed
//!    or Canceled
//!
//! Shutting the pool down stops workers from taking new jobs and, because job
//! tokens are children of the pool token, cancels every running execution.

use ferry_core::domain::job::{Job, JobStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repository::JobRepository;
use crate::scheduler::cancellation::CancellationRegistry;
use crate::scheduler::observer::{JobObserver, TracingObserver};
use crate::service::{ExecutionError, ExecutionReport, ExecutionService};

/// Pool sizing
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of concurrent workers
    pub worker_count: usize,

    /// Jobs that can wait in the queue before `submit` blocks
    pub queue_capacity: usize,
}

/// Errors returned by the worker pool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool is shutting down")]
    ShuttingDown,

    #[error("worker pool already started")]
    AlreadyStarted,

    #[error("job {id} is not queued (current: {status})")]
    NotQueued { id: Uuid, status: JobStatus },
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Bounded pool of job workers
pub struct WorkerPool {
    worker_count: usize,
    sender: mpsc::Sender<Job>,
    queue: JobQueue,
    store: Arc<dyn JobRepository>,
    registry: Arc<CancellationRegistry>,
    executor: Arc<dyn ExecutionService>,
    observer: Arc<dyn JobObserver>,
    shutdown: CancellationToken,
    started: AtomicBool,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Creates a pool; no worker runs until `start` is called
    ///
    /// # Arguments
    /// * `config` - Worker count and queue capacity (both at least 1)
    /// * `store` - Where job transitions are published
    /// * `registry` - Where running jobs expose their cancellation handles
    /// * `executor` - Runs the jobs
    /// * `shutdown` - Pool lifetime token; every job token derives from it
    pub fn new(
        config: PoolConfig,
        store: Arc<dyn JobRepository>,
        registry: Arc<CancellationRegistry>,
        executor: Arc<dyn ExecutionService>,
        shutdown: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));

        Self {
            worker_count: config.worker_count.max(1),
            sender,
            queue: Arc::new(Mutex::new(receiver)),
            store,
            registry,
            executor,
            observer: Arc::new(TracingObserver),
            shutdown,
            started: AtomicBool::new(false),
            workers: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Replaces the default tracing observer
    #[cfg(test)]
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Spawns the workers
    pub fn start(&self) -> Result<(), PoolError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PoolError::AlreadyStarted);
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for id in 0..self.worker_count {
            let worker = Worker {
                id,
                queue: Arc::clone(&self.queue),
                store: Arc::clone(&self.store),
                registry: Arc::clone(&self.registry),
                executor: Arc::clone(&self.executor),
                observer: Arc::clone(&self.observer),
                shutdown: self.shutdown.clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }

        info!("Started {} workers", self.worker_count);
        Ok(())
    }

    /// Hands a queued job to the workers
    ///
    /// Waits only for room in the queue, never for the job to run.
    pub async fn submit(&self, job: Job) -> Result<(), PoolError> {
        if job.status != JobStatus::Queued {
            return Err(PoolError::NotQueued {
                id: job.id,
                status: job.status,
            });
        }

        if self.is_shutting_down() {
            return Err(PoolError::ShuttingDown);
        }

        tokio::select! {
            result = self.sender.send(job) => result.map_err(|_| PoolError::ShuttingDown),
            _ = self.shutdown.cancelled() => Err(PoolError::ShuttingDown),
        }
    }

    /// Requests cancellation of a running job
    ///
    /// Returns false when the job is not running right now.
    pub fn cancel(&self, id: Uuid) -> bool {
        self.registry.cancel(id)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops accepting jobs and cancels running ones
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits for every worker to exit
    ///
    /// Workers exit once the pool is shut down and their current job has
    /// been stored.
    pub async fn join(&self) {
        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task panicked: {}", e);
            }
        }
    }
}

/// One worker loop and everything it needs
struct Worker {
    id: usize,
    queue: JobQueue,
    store: Arc<dyn JobRepository>,
    registry: Arc<CancellationRegistry>,
    executor: Arc<dyn ExecutionService>,
    observer: Arc<dyn JobObserver>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = self.next_job() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.process(job).await;
        }

        debug!("Worker {} stopped", self.id);
    }

    async fn next_job(&self) -> Option<Job> {
        self.queue.lock().await.recv().await
    }

    async fn process(&self, mut job: Job) {
        let id = job.id;

        if let Err(e) = job.start() {
            warn!("Worker {} dropping job {}: {}", self.id, id, e);
            return;
        }
        self.store.update(job.clone());
        self.observer.job_started(&job);

        let token = self.shutdown.child_token();
        self.registry.register(id, token.clone());

        let ExecutionReport { logs, outcome } = self.execute(token.clone(), job.clone()).await;

        self.registry.unregister(id);

        // Success wins even if cancellation arrived too late to matter
        let finished = match outcome {
            Ok(()) => job.complete(logs),
            Err(_) if token.is_cancelled() => job.cancel(logs),
            Err(e) => job.fail(logs, e.to_string()),
        };

        if let Err(e) = finished {
            error!("Worker {} could not finish job {}: {}", self.id, id, e);
            return;
        }

        self.store.update(job.clone());
        self.observer.job_finished(&job);
    }

    /// Runs the execution in its own task so a panic only fails this job
    async fn execute(&self, token: CancellationToken, job: Job) -> ExecutionReport {
        let id = job.id;
        let executor = Arc::clone(&self.executor);

        match tokio::spawn(async move { executor.execute_job(token, job).await }).await {
            Ok(report) => report,
            Err(e) => {
                error!("Execution of job {} aborted: {}", id, e);
                ExecutionReport::failure(String::new(), ExecutionError::Panicked)
            }
        }
    }
}
