//! Job queue seam and an in-process implementation
//!
//! The orchestrator never runs its own timers: a queue enforces each job's
//! timeout and tells the handler when one expires.

use crate::OrchestratorError;
use async_trait::async_trait;
use chronicle_domain::{now_millis, Timestamp};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// A unit of work on a queue
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Job id
    pub id: String,
    /// Queue the job was added to
    pub queue: String,
    /// Handler-defined kind
    pub job_type: String,
    /// Handler-defined input
    pub payload: Value,
    /// Time limit for handling the job
    pub timeout: Option<Duration>,
    /// When the job was added
    pub enqueued_at: Timestamp,
}

/// Options for [`JobQueue::add_job`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Abandon the handler after this long and call [`JobHandler::on_timeout`]
    pub timeout: Option<Duration>,
}

/// Options for [`JobQueue::register_worker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Jobs handled at the same time
    pub concurrency: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

/// Consumer of jobs from one queue
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Handle a job; errors are the handler's own business
    async fn handle(&self, job: Job);

    /// Called after `handle` was abandoned for exceeding the job's timeout
    async fn on_timeout(&self, job: Job) {
        tracing::warn!("Job {} ({}) timed out", job.id, job.job_type);
    }
}

/// Named queues of jobs with registered workers
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job, returning its id
    async fn add_job(
        &self,
        queue: &str,
        job_type: &str,
        payload: Value,
        options: JobOptions,
    ) -> Result<String, OrchestratorError>;

    /// Start consuming a queue
    async fn register_worker(
        &self,
        queue: &str,
        handler: Arc<dyn JobHandler>,
        options: WorkerOptions,
    ) -> Result<(), OrchestratorError>;
}

struct Channel {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Option<mpsc::UnboundedReceiver<Job>>,
}

impl Channel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

/// Tokio-backed queue living in process memory
///
/// Jobs added before a worker registers are buffered. Each queue accepts one
/// worker, which handles up to `concurrency` jobs at once. Must be used from
/// within a Tokio runtime.
#[derive(Default)]
pub struct InMemoryJobQueue {
    channels: Mutex<HashMap<String, Channel>>,
}

impl InMemoryJobQueue {
    /// Create a queue with no channels
    pub fn new() -> Self {
        Self::default()
    }

    fn with_channel<T>(&self, queue: &str, f: impl FnOnce(&mut Channel) -> T) -> T {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        f(channels.entry(queue.to_string()).or_insert_with(Channel::new))
    }
}

async fn run_job(handler: Arc<dyn JobHandler>, job: Job) {
    match job.timeout {
        Some(limit) => {
            if tokio::time::timeout(limit, handler.handle(job.clone())).await.is_err() {
                tracing::warn!("Job {} exceeded {:?}", job.id, limit);
                handler.on_timeout(job).await;
            }
        }
        None => handler.handle(job).await,
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn add_job(
        &self,
        queue: &str,
        job_type: &str,
        payload: Value,
        options: JobOptions,
    ) -> Result<String, OrchestratorError> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            queue: queue.to_string(),
            job_type: job_type.to_string(),
            payload,
            timeout: options.timeout,
            enqueued_at: now_millis(),
        };
        let id = job.id.clone();

        self.with_channel(queue, |channel| channel.sender.send(job))
            .map_err(|_| OrchestratorError::Queue(format!("queue {} is closed", queue)))?;

        tracing::debug!("Queued job {} ({}) on {}", id, job_type, queue);
        Ok(id)
    }

    async fn register_worker(
        &self,
        queue: &str,
        handler: Arc<dyn JobHandler>,
        options: WorkerOptions,
    ) -> Result<(), OrchestratorError> {
        if options.concurrency == 0 {
            return Err(OrchestratorError::Queue("concurrency must be at least 1".to_string()));
        }
        let mut receiver = self
            .with_channel(queue, |channel| channel.receiver.take())
            .ok_or_else(|| OrchestratorError::Queue(format!("queue {} already has a worker", queue)))?;

        let semaphore = Arc::new(Semaphore::new(options.concurrency));
        let name = queue.to_string();

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_job(handler, job).await;
                });
            }
            tracing::debug!("Worker for {} stopped", name);
        });

        tracing::info!(
            "Worker registered on {} (concurrency: {})",
            queue,
            options.concurrency
        );
        Ok(())
    }
}
