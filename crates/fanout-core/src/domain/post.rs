//! Post record: one per-platform publishing attempt and its lifecycle.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{JobId, MemeId, PostId};
use super::platform::Platform;
use crate::error::FanoutError;

/// Post status.
///
/// State transitions:
/// - Pending -> Published | Failed
/// - Scheduled -> Published | Failed
///
/// Published and Failed are terminal. A retry after a terminal state is a new Post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Pending,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PostStatus::Pending => "PENDING",
            PostStatus::Scheduled => "SCHEDULED",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// The terminal transition applied to a Post.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Published {
        external_post_id: String,
        metrics: serde_json::Value,
    },
    Failed {
        reason: String,
    },
}

impl Completion {
    pub fn failed(reason: impl Into<String>) -> Self {
        Completion::Failed {
            reason: reason.into(),
        }
    }
}

/// Post record.
///
/// Design:
/// - The store holds these rows; all mutations go through the methods below.
/// - `caption` and `hashtags` are the dispatch parameters of the request, kept
///   so a stranded row can be re-dispatched later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub meme_id: MemeId,
    pub platform: Platform,
    pub status: PostStatus,

    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub external_post_id: Option<String>,

    /// Platform metrics, stored verbatim.
    pub metrics: Option<serde_json::Value>,
    pub failure_reason: Option<String>,

    /// Caption override from the request (None = use the meme's caption).
    pub caption: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,

    /// Deferred job carrying this post, once enqueued.
    pub job_id: Option<JobId>,

    /// A dispatch attempt holds the post until this instant.
    pub claimed_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// New post for immediate dispatch.
    pub fn pending(id: PostId, meme_id: MemeId, platform: Platform, now: DateTime<Utc>) -> Self {
        Self {
            id,
            meme_id,
            platform,
            status: PostStatus::Pending,
            scheduled_at: None,
            published_at: None,
            external_post_id: None,
            metrics: None,
            failure_reason: None,
            caption: None,
            hashtags: Vec::new(),
            job_id: None,
            claimed_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// New post deferred to `at`.
    pub fn scheduled(
        id: PostId,
        meme_id: MemeId,
        platform: Platform,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut post = Self::pending(id, meme_id, platform, now);
        post.status = PostStatus::Scheduled;
        post.scheduled_at = Some(at);
        post
    }

    pub fn with_request(mut self, caption: Option<String>, hashtags: Vec<String>) -> Self {
        self.caption = caption;
        self.hashtags = hashtags;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether a dispatch attempt currently holds this post.
    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }

    /// Take the dispatch claim. Fails on terminal or already-claimed posts.
    pub fn try_claim(&mut self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if self.is_terminal() || self.is_claimed(now) {
            return false;
        }
        self.claimed_until = Some(now + ttl);
        self.updated_at = now;
        true
    }

    pub fn release_claim(&mut self, now: DateTime<Utc>) {
        self.claimed_until = None;
        self.updated_at = now;
    }

    /// Apply the single terminal transition.
    pub fn complete(&mut self, completion: Completion, now: DateTime<Utc>) -> Result<(), FanoutError> {
        if self.is_terminal() {
            return Err(FanoutError::InvalidTransition {
                post_id: self.id,
                status: self.status,
            });
        }
        match completion {
            Completion::Published {
                external_post_id,
                metrics,
            } => {
                self.status = PostStatus::Published;
                self.external_post_id = Some(external_post_id);
                self.metrics = Some(metrics);
                self.published_at = Some(now);
            }
            Completion::Failed { reason } => {
                self.status = PostStatus::Failed;
                self.failure_reason = Some(reason);
            }
        }
        self.claimed_until = None;
        self.updated_at = now;
        Ok(())
    }
}
