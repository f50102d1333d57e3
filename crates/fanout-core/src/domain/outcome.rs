//! Per-platform result of a publish request.
//!
//! A request never fails because one destination failed; each platform gets
//! its own outcome, either the Post row (whatever its status) or a failure
//! descriptor when no usable Post exists.

use serde::{Deserialize, Serialize};

use super::ids::PostId;
use super::post::{Post, PostStatus};
use crate::error::FanoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    UnsupportedPlatform,
    NotFound,
    Adapter,
    Scheduler,
    Store,
    Internal,
}

impl From<&FanoutError> for FailureKind {
    fn from(err: &FanoutError) -> Self {
        match err {
            FanoutError::UnsupportedPlatform(_) => FailureKind::UnsupportedPlatform,
            FanoutError::NotFound { .. } => FailureKind::NotFound,
            FanoutError::Adapter(_) => FailureKind::Adapter,
            FanoutError::Scheduler(_) => FailureKind::Scheduler,
            FanoutError::Store(_) | FanoutError::DispatchInProgress(_) => FailureKind::Store,
            _ => FailureKind::Internal,
        }
    }
}

/// Structured failure for one platform entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchFailure {
    /// Platform as the caller wrote it.
    pub platform: String,
    pub kind: FailureKind,
    pub message: String,

    /// Set when a Post row exists (e.g. the enqueue failed after creation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
}

impl DispatchFailure {
    pub fn from_error(platform: impl Into<String>, err: &FanoutError, post_id: Option<PostId>) -> Self {
        Self {
            platform: platform.into(),
            kind: err.into(),
            message: err.to_string(),
            post_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Post(Post),
    Rejected(DispatchFailure),
}

impl DispatchOutcome {
    pub fn post(&self) -> Option<&Post> {
        match self {
            DispatchOutcome::Post(p) => Some(p),
            DispatchOutcome::Rejected(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&DispatchFailure> {
        match self {
            DispatchOutcome::Post(_) => None,
            DispatchOutcome::Rejected(f) => Some(f),
        }
    }

    pub fn status(&self) -> Option<PostStatus> {
        self.post().map(|p| p.status)
    }

    pub fn is_published(&self) -> bool {
        self.status() == Some(PostStatus::Published)
    }
}
