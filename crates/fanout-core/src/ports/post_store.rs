//! PostStore port - durable per-destination dispatch records.
//!
//! Every mutation after creation is conditional on the row's current state,
//! and implementations must apply each check-and-write atomically with
//! respect to concurrent callers on the same post.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::{Completion, JobId, Post, PostId, PostStatus};
use crate::error::FanoutError;

/// Result of `PostStore::claim`.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The caller now holds the post until the TTL runs out.
    Acquired(Post),

    /// Another dispatch attempt holds it.
    Busy(Post),

    /// Nothing left to do.
    Terminal(Post),
}

/// Result of `PostStore::complete`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(Post),

    /// The post was already terminal; nothing was written.
    AlreadyTerminal(Post),
}

impl Transition {
    pub fn into_post(self) -> Post {
        match self {
            Transition::Applied(p) | Transition::AlreadyTerminal(p) => p,
        }
    }
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a new row. Fails if the id already exists.
    async fn create(&self, post: Post) -> Result<Post, FanoutError>;

    /// Fails with `FanoutError::NotFound` when absent.
    async fn get(&self, id: PostId) -> Result<Post, FanoutError>;

    /// Take the dispatch claim if the post is non-terminal and unclaimed
    /// (or its previous claim has expired).
    async fn claim(&self, id: PostId, now: DateTime<Utc>, ttl: Duration) -> Result<Claim, FanoutError>;

    /// Drop the claim without a terminal transition.
    async fn release(&self, id: PostId, now: DateTime<Utc>) -> Result<(), FanoutError>;

    /// Terminal transition, applied only if the post is not terminal yet.
    async fn complete(
        &self,
        id: PostId,
        completion: Completion,
        now: DateTime<Utc>,
    ) -> Result<Transition, FanoutError>;

    /// Record the deferred job carrying this post.
    async fn attach_job(&self, id: PostId, job_id: JobId, now: DateTime<Utc>) -> Result<Post, FanoutError>;

    async fn list_by_status(&self, status: PostStatus) -> Result<Vec<Post>, FanoutError>;
}
