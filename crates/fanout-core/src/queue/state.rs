//! Job state machine for the queue.

use serde::{Deserialize, Serialize};

/// Job state.
///
/// State transitions:
/// - Waiting -> Active -> Completed
/// - Waiting -> Active -> Waiting (retry with backoff, or lease expired)
/// - Waiting -> Active -> Failed (retries exhausted or permanent error)
/// - Waiting -> Failed (cancelled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Queued; eligible once `not_before` is reached.
    Waiting,

    /// Leased by a worker.
    Active,

    /// Handler succeeded.
    Completed,

    /// Dead letter.
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}
