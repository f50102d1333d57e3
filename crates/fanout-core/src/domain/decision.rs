//! Decision model: what the queue does with a job after a failed attempt.

use std::time::Duration;

use super::errors::JobError;
use crate::queue::{JobRecord, RetryPolicy};

/// The next action for a failed job.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Put the job back in WAITING, eligible again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up: the job becomes FAILED (dead letter).
    MarkDead { reason: String },
}

/// Decides the next action from the job record and the handler error.
///
/// Deciders are pure: the queue applies the returned decision.
pub trait Decider: Send + Sync {
    fn decide(&self, job: &JobRecord, error: &JobError) -> Decision;
}

/// Attempt-budget decider with exponential backoff:
/// - Permanent errors are dead immediately
/// - Retry while attempts < max_attempts
/// - Dead once attempts >= max_attempts
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, job: &JobRecord, error: &JobError) -> Decision {
        if error.is_permanent() {
            return Decision::MarkDead {
                reason: format!("permanent failure: {}", error.message),
            };
        }
        if job.attempts >= job.max_attempts {
            Decision::MarkDead {
                reason: format!(
                    "max attempts reached ({}/{}): {}",
                    job.attempts, job.max_attempts, error.message
                ),
            }
        } else {
            let delay = self.retry_policy.next_delay(job.attempts);
            Decision::Retry {
                delay,
                reason: format!(
                    "retry attempt {}/{} after {:?}",
                    job.attempts + 1,
                    job.max_attempts,
                    delay
                ),
            }
        }
    }
}
