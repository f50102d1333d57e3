//! Queue module: job state, retry policy, and the in-memory implementation.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::{InMemoryJobQueue, QueueOptions};
pub use record::JobRecord;
pub use retry::RetryPolicy;
pub use state::JobState;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{JobClass, JobError, JobId};
use crate::error::FanoutError;
use crate::observability::QueueCounts;

/// A leased job. The worker owns the lease and must either `ack` or `fail`.
///
/// Design intent:
/// - Queue manages state transitions (Waiting -> Active -> ...).
/// - Worker/handler executes side effects and reports the result.
/// - Delivery is at-least-once: an expired lease is handed out again, so
///   handlers must tolerate running twice for the same job.
#[async_trait]
pub trait JobLease: Send {
    /// Snapshot of the job as leased (`attempts` includes this attempt).
    fn job(&self) -> &JobRecord;

    /// Mark success.
    async fn ack(self: Box<Self>) -> Result<(), FanoutError>;

    /// Mark failure. The queue decides retry or dead letter and returns the
    /// resulting state.
    async fn fail(self: Box<Self>, error: JobError) -> Result<JobState, FanoutError>;
}

/// Queue port. Jobs are partitioned by class; a lease for one class never
/// returns a job of another.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job, eligible once `not_before` is reached.
    async fn enqueue(
        &self,
        class: JobClass,
        payload: serde_json::Value,
        not_before: DateTime<Utc>,
    ) -> Result<JobId, FanoutError>;

    /// Lease one eligible job of `class`, or `None` if nothing is eligible now.
    async fn try_lease(&self, class: JobClass) -> Result<Option<Box<dyn JobLease>>, FanoutError>;

    /// Lease one eligible job of `class`, waiting until one is.
    async fn lease(&self, class: JobClass) -> Result<Box<dyn JobLease>, FanoutError>;

    /// Remove a WAITING job (it becomes FAILED with reason "cancelled").
    /// Returns false when the job already started or finished.
    async fn cancel(&self, id: JobId) -> Result<bool, FanoutError>;

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, FanoutError>;

    async fn counts(&self, class: JobClass) -> Result<QueueCounts, FanoutError>;
}
