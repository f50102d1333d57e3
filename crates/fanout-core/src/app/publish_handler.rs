//! Job handler for the publishing class: runs the single-destination
//! dispatch for a deferred Post.

use async_trait::async_trait;

use super::orchestrator::{DispatchMode, Orchestrator};
use crate::domain::{JobClass, JobError, JobPayload, PublishJob};
use crate::error::FanoutError;
use crate::queue::JobRecord;
use crate::runtime::JobHandler;

pub struct PublishJobHandler {
    orchestrator: Orchestrator,
}

impl PublishJobHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobHandler for PublishJobHandler {
    fn job_class(&self) -> JobClass {
        PublishJob::CLASS
    }

    /// Transient failures go back to the queue for retry. On the last attempt
    /// the Post is marked FAILED before the error is returned, so a dead job
    /// never leaves its Post behind.
    async fn handle(&self, job: &JobRecord) -> Result<(), JobError> {
        let payload = PublishJob::decode(&job.payload)
            .map_err(|e| JobError::permanent(format!("invalid publish payload: {e}")))?;

        let err = match self.orchestrator.dispatch_job(&payload, DispatchMode::Propagate).await {
            Ok(post) => {
                tracing::debug!(job_id = %job.id, post_id = %post.id, status = %post.status, "publish job done");
                return Ok(());
            }
            Err(e) => e,
        };
        let reason = match &err {
            FanoutError::Adapter(adapter) => adapter.to_string(),
            other => other.to_string(),
        };
        let err = JobError::from(err);

        if job.is_final_attempt() && !err.is_permanent() {
            tracing::warn!(
                job_id = %job.id,
                post_id = %payload.post_id,
                attempt = job.attempts,
                error = %reason,
                "retries exhausted, failing post"
            );
            self.orchestrator
                .fail_post(payload.post_id, reason)
                .await
                .map_err(JobError::from)?;
        }
        Err(err)
    }
}
