//! JobScheduler - the queue-facing surface of the worker runtime.
//!
//! Callers enqueue work by class; `start` brings up one worker group per
//! class with a registered handler, each sized by its own concurrency knob.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::WorkersConfig;
use crate::domain::{JobClass, JobId, JobPayload};
use crate::error::FanoutError;
use crate::observability::QueueCounts;
use crate::queue::{JobQueue, JobRecord};
use crate::runtime::{HandlerRegistry, JobHandler, Runtime};
use crate::worker::{WorkerGroup, WorkerPool};

#[derive(Clone)]
pub struct JobScheduler {
    queue: Arc<dyn JobQueue>,
    workers: WorkersConfig,
}

impl JobScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, workers: WorkersConfig) -> Self {
        Self { queue, workers }
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Enqueue `payload` for `class`, eligible once `not_before` is reached.
    /// Any queue failure surfaces as `FanoutError::Scheduler`.
    pub async fn enqueue(
        &self,
        class: JobClass,
        payload: serde_json::Value,
        not_before: DateTime<Utc>,
    ) -> Result<JobId, FanoutError> {
        self.queue
            .enqueue(class, payload, not_before)
            .await
            .map_err(|e| match e {
                FanoutError::Scheduler(_) => e,
                other => FanoutError::Scheduler(other.to_string()),
            })
    }

    pub async fn enqueue_typed<P: JobPayload>(
        &self,
        payload: &P,
        not_before: DateTime<Utc>,
    ) -> Result<JobId, FanoutError> {
        self.enqueue(P::CLASS, payload.encode()?, not_before).await
    }

    pub async fn cancel(&self, id: JobId) -> Result<bool, FanoutError> {
        self.queue.cancel(id).await
    }

    pub async fn job(&self, id: JobId) -> Result<Option<JobRecord>, FanoutError> {
        self.queue.get(id).await
    }

    pub async fn counts(&self, class: JobClass) -> Result<QueueCounts, FanoutError> {
        self.queue.counts(class).await
    }

    /// Run `concurrency` workers for `class`, all driving `handler`.
    pub fn run_workers(
        &self,
        class: JobClass,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Result<WorkerGroup, FanoutError> {
        if concurrency == 0 {
            return Err(FanoutError::Config(format!("concurrency for {class} must be at least 1")));
        }
        if handler.job_class() != class {
            return Err(FanoutError::Config(format!(
                "handler for {} cannot run {class} jobs",
                handler.job_class()
            )));
        }

        let mut registry = HandlerRegistry::new();
        registry.register(handler)?;
        let runtime = Arc::new(Runtime::new(Arc::new(registry)));
        Ok(WorkerGroup::spawn(class, concurrency, Arc::clone(&self.queue), runtime))
    }

    /// One worker group per registered class, sized from the workers config.
    pub fn start(&self, registry: Arc<HandlerRegistry>) -> WorkerPool {
        let runtime = Arc::new(Runtime::new(Arc::clone(&registry)));
        let mut pool = WorkerPool::new();
        for class in registry.classes() {
            let n = self.workers.concurrency(class).max(1);
            pool.push(WorkerGroup::spawn(class, n, Arc::clone(&self.queue), Arc::clone(&runtime)));
        }
        pool
    }
}
