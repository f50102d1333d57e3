//! Job record: metadata + payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobState;
use crate::domain::{JobClass, JobId};

/// A job in the queue.
///
/// Design:
/// - This is the single source of truth for job state.
/// - Queue structures (per-class heaps) hold JobIds only.
/// - All state transitions happen here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub class: JobClass,
    pub payload: serde_json::Value,
    pub state: JobState,

    /// Earliest time a worker may run this job.
    pub not_before: DateTime<Utc>,

    /// Attempts started so far (including the current one while Active).
    pub attempts: u32,
    pub max_attempts: u32,

    pub last_error: Option<String>,

    /// While Active: the lease is reclaimed after this instant.
    pub lease_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(
        id: JobId,
        class: JobClass,
        payload: serde_json::Value,
        not_before: DateTime<Utc>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            class,
            payload,
            state: JobState::Waiting,
            not_before,
            attempts: 0,
            max_attempts,
            last_error: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Waiting && self.not_before <= now
    }

    /// Whether this is the last attempt the budget allows.
    pub fn is_final_attempt(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Waiting -> Active (increments attempts).
    pub fn start_attempt(&mut self, now: DateTime<Utc>, lease_expires_at: DateTime<Utc>) {
        self.state = JobState::Active;
        self.attempts += 1;
        self.lease_expires_at = Some(lease_expires_at);
        self.updated_at = now;
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.state = JobState::Completed;
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) {
        self.state = JobState::Failed;
        self.last_error = Some(error);
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    /// Active -> Waiting, eligible again at `not_before`.
    pub fn schedule_retry(&mut self, not_before: DateTime<Utc>, error: String, now: DateTime<Utc>) {
        self.state = JobState::Waiting;
        self.not_before = not_before;
        self.last_error = Some(error);
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    /// Active -> Waiting after a lost lease. The attempt stays counted.
    pub fn reclaim(&mut self, now: DateTime<Utc>) {
        self.state = JobState::Waiting;
        self.not_before = now;
        self.lease_expires_at = None;
        self.updated_at = now;
    }
}
