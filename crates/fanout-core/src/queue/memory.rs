//! In-memory queue implementation.

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use super::{JobLease, JobQueue, JobRecord, JobState, RetryPolicy};
use crate::domain::{Decider, Decision, DefaultDecider, JobClass, JobError, JobId};
use crate::error::FanoutError;
use crate::observability::QueueCounts;
use crate::ports::{Clock, IdGenerator, UlidGenerator};

/// Waiting-heap entry.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first, then
/// insertion order). Entries may go stale (cancelled, re-scheduled); they are
/// discarded when they reach the top.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledJob {
    not_before: DateTime<Utc>,
    seq: u64,
    job_id: JobId,
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .not_before
            .cmp(&self.not_before)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Tuning knobs for the in-memory queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Attempt budget per job (first run included).
    pub max_attempts: u32,

    /// An Active job whose worker has not reported back within this window
    /// is handed out again.
    pub lease_ttl: chrono::Duration,

    /// Upper bound on how long an idle `lease()` sleeps before re-checking.
    pub idle_poll: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lease_ttl: chrono::Duration::minutes(10),
            idle_poll: Duration::from_millis(500),
        }
    }
}

struct QueueState {
    /// All job records (single source of truth).
    records: HashMap<JobId, JobRecord>,

    /// Per-class waiting heaps (JobIds only).
    waiting: HashMap<JobClass, BinaryHeap<ScheduledJob>>,

    next_seq: u64,
}

impl QueueState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            waiting: HashMap::new(),
            next_seq: 0,
        }
    }

    fn push_waiting(&mut self, class: JobClass, job_id: JobId, not_before: DateTime<Utc>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.waiting.entry(class).or_default().push(ScheduledJob {
            not_before,
            seq,
            job_id,
        });
    }

    /// Return Active jobs with expired leases to Waiting.
    fn reclaim_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<(JobId, JobClass)> = self
            .records
            .values()
            .filter(|r| {
                r.state == JobState::Active && r.lease_expires_at.is_some_and(|at| at <= now)
            })
            .map(|r| (r.id, r.class))
            .collect();

        for &(job_id, class) in &expired {
            if let Some(record) = self.records.get_mut(&job_id) {
                record.reclaim(now);
                tracing::warn!(%job_id, %class, attempts = record.attempts, "lease expired, job requeued");
            }
            self.push_waiting(class, job_id, now);
        }
        expired.len()
    }

    /// Pop the earliest eligible job of `class`, skipping stale heap entries.
    fn pop_eligible(&mut self, class: JobClass, now: DateTime<Utc>) -> Option<JobId> {
        let heap = self.waiting.get_mut(&class)?;
        while let Some(entry) = heap.peek() {
            let live = self.records.get(&entry.job_id).is_some_and(|r| {
                r.state == JobState::Waiting && r.not_before == entry.not_before
            });
            if !live {
                heap.pop();
                continue;
            }
            if entry.not_before > now {
                return None; // Heap is sorted, nothing else is due
            }
            return heap.pop().map(|e| e.job_id);
        }
        None
    }

    fn next_wake(&self, class: JobClass) -> Option<DateTime<Utc>> {
        self.waiting
            .get(&class)
            .and_then(|heap| heap.peek())
            .map(|entry| entry.not_before)
    }

    fn counts(&self, class: JobClass) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values().filter(|r| r.class == class) {
            match record.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// In-memory job queue.
///
/// Stands in for the durable queue in tests and single-process deployments.
/// `snapshot()` / `restore()` let a caller persist and reload its contents.
pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    decider: Arc<dyn Decider>,
    options: QueueOptions,
}

impl InMemoryJobQueue {
    pub fn new(retry_policy: RetryPolicy, options: QueueOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::new())),
            notify: Arc::new(Notify::new()),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            decider: Arc::new(DefaultDecider::new(retry_policy)),
            clock,
            options,
        }
    }

    /// Replace the retry decider.
    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    /// Rebuild a queue from a snapshot. Jobs that were Active when the
    /// snapshot was taken are treated as lost leases and become Waiting.
    pub fn restore(
        records: Vec<JobRecord>,
        retry_policy: RetryPolicy,
        options: QueueOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queue = Self::new(retry_policy, options, clock);
        let now = queue.clock.now();
        let mut state = QueueState::new();
        for mut record in records {
            if record.state == JobState::Active {
                record.reclaim(now);
            }
            if record.state == JobState::Waiting {
                state.push_waiting(record.class, record.id, record.not_before);
            }
            state.records.insert(record.id, record);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            ..queue
        }
    }

    /// Every job record, ordered by id (creation order).
    pub async fn snapshot(&self) -> Vec<JobRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<JobRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    fn take(&self, state: &mut QueueState, class: JobClass, now: DateTime<Utc>) -> Option<Box<dyn JobLease>> {
        let job_id = state.pop_eligible(class, now)?;
        let record = state.records.get_mut(&job_id)?;
        let expires_at = now
            .checked_add_signed(self.options.lease_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        record.start_attempt(now, expires_at);
        tracing::debug!(%job_id, %class, attempt = record.attempts, "job leased");

        Some(Box::new(InMemoryLease {
            job: record.clone(),
            state: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
            clock: Arc::clone(&self.clock),
            decider: Arc::clone(&self.decider),
        }))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(
        &self,
        class: JobClass,
        payload: serde_json::Value,
        not_before: DateTime<Utc>,
    ) -> Result<JobId, FanoutError> {
        let now = self.clock.now();
        let job_id = self.ids.generate_job_id();
        let record = JobRecord::new(
            job_id,
            class,
            payload,
            not_before,
            self.options.max_attempts,
            now,
        );

        {
            let mut state = self.state.lock().await;
            state.records.insert(job_id, record);
            state.push_waiting(class, job_id, not_before);
        }

        // Wake idle workers (outside the lock)
        self.notify.notify_waiters();
        tracing::debug!(%job_id, %class, %not_before, "job enqueued");
        Ok(job_id)
    }

    async fn try_lease(&self, class: JobClass) -> Result<Option<Box<dyn JobLease>>, FanoutError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.reclaim_expired(now);
        Ok(self.take(&mut state, class, now))
    }

    async fn lease(&self, class: JobClass) -> Result<Box<dyn JobLease>, FanoutError> {
        loop {
            // Register interest before checking, so an enqueue between the
            // check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = self.clock.now();
            let next_wake = {
                let mut state = self.state.lock().await;
                state.reclaim_expired(now);
                if let Some(lease) = self.take(&mut state, class, now) {
                    return Ok(lease);
                }
                state.next_wake(class)
            };

            let idle = self.options.idle_poll;
            let wait = next_wake
                .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO).min(idle))
                .unwrap_or(idle);

            tokio::select! {
                _ = &mut notified => {},
                _ = tokio::time::sleep(wait) => {},
            }
        }
    }

    async fn cancel(&self, id: JobId) -> Result<bool, FanoutError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| FanoutError::not_found("job", id))?;

        if record.state != JobState::Waiting {
            return Ok(false);
        }
        record.mark_failed("cancelled".to_string(), now);
        tracing::info!(job_id = %id, class = %record.class, "job cancelled");
        Ok(true)
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, FanoutError> {
        let state = self.state.lock().await;
        Ok(state.records.get(&id).cloned())
    }

    async fn counts(&self, class: JobClass) -> Result<QueueCounts, FanoutError> {
        let state = self.state.lock().await;
        Ok(state.counts(class))
    }
}

/// Lease implementation for InMemoryJobQueue.
///
/// `job.attempts` doubles as the lease token: a report from a lease that was
/// reclaimed and handed out again no longer matches and is ignored.
struct InMemoryLease {
    job: JobRecord,
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    clock: Arc<dyn Clock>,
    decider: Arc<dyn Decider>,
}

impl InMemoryLease {
    fn holds(&self, record: &JobRecord) -> bool {
        record.state == JobState::Active && record.attempts == self.job.attempts
    }
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn job(&self) -> &JobRecord {
        &self.job
    }

    async fn ack(self: Box<Self>) -> Result<(), FanoutError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let Some(record) = state.records.get_mut(&self.job.id) else {
            return Err(FanoutError::not_found("job", self.job.id));
        };

        if !self.holds(record) {
            tracing::debug!(job_id = %self.job.id, "stale lease ack ignored");
            return Ok(());
        }
        record.mark_completed(now);
        Ok(())
    }

    async fn fail(self: Box<Self>, error: JobError) -> Result<JobState, FanoutError> {
        let now = self.clock.now();
        let (state_after, should_notify) = {
            let mut state = self.state.lock().await;
            let Some(record) = state.records.get_mut(&self.job.id) else {
                return Err(FanoutError::not_found("job", self.job.id));
            };

            if !self.holds(record) {
                tracing::debug!(job_id = %self.job.id, "stale lease failure ignored");
                return Ok(record.state);
            }

            match self.decider.decide(record, &error) {
                Decision::Retry { delay, reason } => {
                    let backoff = chrono::Duration::from_std(delay)
                        .unwrap_or_else(|_| chrono::Duration::days(1));
                    let not_before = now + backoff;
                    record.schedule_retry(not_before, error.message.clone(), now);
                    tracing::info!(
                        job_id = %self.job.id,
                        class = %self.job.class,
                        attempt = record.attempts,
                        error = %error.message,
                        "{reason}"
                    );
                    let class = record.class;
                    state.push_waiting(class, self.job.id, not_before);
                    (JobState::Waiting, true)
                }
                Decision::MarkDead { reason } => {
                    record.mark_failed(error.message.clone(), now);
                    tracing::warn!(
                        job_id = %self.job.id,
                        class = %self.job.class,
                        attempt = record.attempts,
                        "job dead-lettered: {reason}"
                    );
                    (JobState::Failed, false)
                }
            }
        }; // Lock released here

        if should_notify {
            self.notify.notify_waiters();
        }
        Ok(state_after)
    }
}
