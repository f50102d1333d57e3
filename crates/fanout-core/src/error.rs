use thiserror::Error;

use crate::domain::{JobClass, PostId, PostStatus};

/// Crate-wide error.
///
/// Whole-request preconditions (`NotFound` for the meme, `EmptyPlatforms`)
/// reach the caller of `request_publish`. Everything per-platform is captured
/// into a `DispatchOutcome` instead.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("at least one platform is required")]
    EmptyPlatforms,

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("post {post_id} is already {status}")]
    InvalidTransition { post_id: PostId, status: PostStatus },

    #[error("post {0} is being dispatched by another worker")]
    DispatchInProgress(PostId),

    #[error("handler already registered for job class {0}")]
    DuplicateHandler(JobClass),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl FanoutError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Failure reported by a publisher adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("request timed out")]
    Timeout,

    #[error("credentials rejected: {0}")]
    Credentials(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("platform returned status {status}: {message}")]
    Platform { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}
