//! Handler registry and job execution, keyed by job class.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{JobClass, JobError};
use crate::error::FanoutError;
use crate::queue::JobRecord;

/// A handler for one job class.
///
/// Takes the whole `JobRecord` so the handler can decode the payload as it
/// likes and see the attempt count.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_class(&self) -> JobClass;

    async fn handle(&self, job: &JobRecord) -> Result<(), JobError>;
}

/// Registry of handlers (job class -> handler).
///
/// Built during initialization (mutable), read-only once workers run.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobClass, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own job class. One handler per class.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) -> Result<(), FanoutError> {
        let class = handler.job_class();
        if self.handlers.contains_key(&class) {
            return Err(FanoutError::DuplicateHandler(class));
        }
        self.handlers.insert(class, handler);
        Ok(())
    }

    pub fn get(&self, class: JobClass) -> Option<&Arc<dyn JobHandler>> {
        self.handlers.get(&class)
    }

    /// Registered classes, in `JobClass::ALL` order.
    pub fn classes(&self) -> Vec<JobClass> {
        JobClass::ALL
            .into_iter()
            .filter(|c| self.handlers.contains_key(c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Runtime executes a `JobRecord` by dispatching to the handler of its class.
pub struct Runtime {
    registry: Arc<HandlerRegistry>,
}

impl Runtime {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute one job. A job with no handler for its class cannot succeed
    /// on retry, so that is a permanent error.
    pub async fn execute(&self, job: &JobRecord) -> Result<(), JobError> {
        let handler = self
            .registry
            .get(job.class)
            .ok_or_else(|| JobError::permanent(format!("no handler for job class {}", job.class)))?;

        handler.handle(job).await
    }
}
