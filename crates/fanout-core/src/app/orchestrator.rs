//! Publishing orchestrator.
//!
//! `request_publish` fans one meme out to several platforms. Each platform
//! gets its own Post row and its own task; a failure on one platform is
//! recorded on that platform's outcome and never touches the others.
//!
//! `dispatch` is the single-destination primitive shared by the inline path
//! and the publishing job handler:
//! claim post -> select publisher -> load meme -> publish (bounded) -> complete

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::publishers::PublisherSet;
use super::scheduler::JobScheduler;
use crate::config::DispatchConfig;
use crate::domain::{
    Completion, DispatchFailure, DispatchOutcome, FailureKind, Meme, MemeId, Platform, Post, PostId,
    PostStatus, PublishJob,
};
use crate::error::{AdapterError, FanoutError};
use crate::ports::{Claim, Clock, IdGenerator, MemeSource, PostStore, PublishContent, Transition};

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishOptions {
    /// Defer until this instant. A time at or before now means immediate.
    pub scheduled: Option<DateTime<Utc>>,

    /// Replaces the meme's caption when non-empty.
    pub caption: Option<String>,

    pub hashtags: Vec<String>,
}

/// What the primitive does with an adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Record it: the Post becomes FAILED.
    MarkFailed,

    /// Release the claim and return the error; the Post stays as it was so
    /// the job runtime can retry.
    Propagate,
}

/// Caption and hashtags for one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchParams {
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
}

impl DispatchParams {
    pub fn from_post(post: &Post) -> Self {
        Self {
            caption: post.caption.clone(),
            hashtags: post.hashtags.clone(),
        }
    }
}

impl From<&PublishJob> for DispatchParams {
    fn from(job: &PublishJob) -> Self {
        Self {
            caption: job.caption.clone(),
            hashtags: job.hashtags.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// The job was removed before it ran; the Post is FAILED("cancelled").
    Cancelled(Post),

    /// Already running or finished; the Post as it currently is.
    TooLate(Post),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Posts handed back to the scheduler.
    pub requeued: Vec<PostId>,

    /// Posts that could not be re-enqueued (left for the next pass).
    pub errors: Vec<DispatchFailure>,
}

#[derive(Clone)]
pub struct Orchestrator {
    memes: Arc<dyn MemeSource>,
    posts: Arc<dyn PostStore>,
    publishers: Arc<PublisherSet>,
    scheduler: JobScheduler,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    settings: DispatchConfig,
}

impl Orchestrator {
    pub fn new(
        memes: Arc<dyn MemeSource>,
        posts: Arc<dyn PostStore>,
        publishers: PublisherSet,
        scheduler: JobScheduler,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        settings: DispatchConfig,
    ) -> Self {
        Self {
            memes,
            posts,
            publishers: Arc::new(publishers),
            scheduler,
            ids,
            clock,
            settings,
        }
    }

    pub fn posts(&self) -> &Arc<dyn PostStore> {
        &self.posts
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Publish `meme_id` to every platform in `platforms`.
    ///
    /// Fails only when `platforms` is empty or the meme does not exist.
    /// Otherwise returns one outcome per distinct platform, in request order.
    /// Platform strings are matched case-insensitively; repeats collapse to
    /// the first occurrence.
    pub async fn request_publish<S: AsRef<str>>(
        &self,
        meme_id: MemeId,
        platforms: &[S],
        options: PublishOptions,
    ) -> Result<Vec<DispatchOutcome>, FanoutError> {
        if platforms.is_empty() {
            return Err(FanoutError::EmptyPlatforms);
        }
        let meme = Arc::new(self.memes.get_meme(meme_id).await?);

        let now = self.clock.now();
        let options = Arc::new(PublishOptions {
            scheduled: options.scheduled.filter(|at| *at > now),
            ..options
        });

        let mut seen = HashSet::new();
        let requested: Vec<String> = platforms
            .iter()
            .map(|p| p.as_ref().to_string())
            .filter(|p| seen.insert(p.trim().to_ascii_uppercase()))
            .collect();

        let mut tasks = Vec::with_capacity(requested.len());
        for raw in requested {
            let this = self.clone();
            let meme = Arc::clone(&meme);
            let options = Arc::clone(&options);
            let name = raw.clone();
            let handle = tokio::spawn(async move { this.publish_one(&name, &meme, &options).await });
            tasks.push((raw, handle));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (raw, handle) in tasks {
            let outcome = handle.await.unwrap_or_else(|e| {
                tracing::error!(platform = %raw, error = %e, "publish task aborted");
                DispatchOutcome::Rejected(DispatchFailure {
                    platform: raw,
                    kind: FailureKind::Internal,
                    message: format!("publish task aborted: {e}"),
                    post_id: None,
                })
            });
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn publish_one(&self, raw: &str, meme: &Meme, options: &PublishOptions) -> DispatchOutcome {
        let platform: Platform = match raw.parse() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(platform = %raw, meme_id = %meme.id, "unsupported platform requested");
                return DispatchOutcome::Rejected(DispatchFailure::from_error(raw, &e, None));
            }
        };

        let now = self.clock.now();
        let post_id = self.ids.generate_post_id();
        let post = match options.scheduled {
            Some(at) => Post::scheduled(post_id, meme.id, platform, at, now),
            None => Post::pending(post_id, meme.id, platform, now),
        }
        .with_request(options.caption.clone(), options.hashtags.clone());

        // The row exists before any dispatch attempt
        let post = match self.posts.create(post).await {
            Ok(p) => p,
            Err(e) => return DispatchOutcome::Rejected(DispatchFailure::from_error(raw, &e, None)),
        };
        tracing::info!(%post_id, %platform, meme_id = %meme.id, status = %post.status, "post created");

        let result = match options.scheduled {
            Some(at) => self.schedule(&post, at).await,
            None => {
                self.dispatch_with(post_id, None, Some(meme), DispatchMode::MarkFailed)
                    .await
            }
        };
        match result {
            Ok(post) => DispatchOutcome::Post(post),
            Err(e) => DispatchOutcome::Rejected(DispatchFailure::from_error(raw, &e, Some(post_id))),
        }
    }

    /// Hand `post` to the publishing queue, eligible at `at`.
    async fn schedule(&self, post: &Post, at: DateTime<Utc>) -> Result<Post, FanoutError> {
        let job = PublishJob {
            post_id: post.id,
            meme_id: post.meme_id,
            caption: post.caption.clone(),
            hashtags: post.hashtags.clone(),
        };
        let job_id = match self.scheduler.enqueue_typed(&job, at).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(post_id = %post.id, platform = %post.platform, error = %e, "enqueue failed, post left for reconciliation");
                return Err(e);
            }
        };
        tracing::info!(post_id = %post.id, %job_id, scheduled_at = %at, "publish job enqueued");
        self.posts.attach_job(post.id, job_id, self.clock.now()).await
    }

    /// Single-destination dispatch with the parameters stored on the Post.
    ///
    /// A terminal Post is returned unchanged with no adapter call.
    pub async fn dispatch(&self, post_id: PostId, mode: DispatchMode) -> Result<Post, FanoutError> {
        self.dispatch_with(post_id, None, None, mode).await
    }

    /// Single-destination dispatch driven by a publishing job payload.
    pub async fn dispatch_job(&self, job: &PublishJob, mode: DispatchMode) -> Result<Post, FanoutError> {
        self.dispatch_with(job.post_id, Some(DispatchParams::from(job)), None, mode)
            .await
    }

    async fn dispatch_with(
        &self,
        post_id: PostId,
        params: Option<DispatchParams>,
        meme: Option<&Meme>,
        mode: DispatchMode,
    ) -> Result<Post, FanoutError> {
        let post = match self
            .posts
            .claim(post_id, self.clock.now(), self.settings.claim_ttl())
            .await?
        {
            Claim::Acquired(p) => p,
            Claim::Terminal(p) => {
                tracing::debug!(%post_id, status = %p.status, "post already terminal, dispatch skipped");
                return Ok(p);
            }
            Claim::Busy(_) => return Err(FanoutError::DispatchInProgress(post_id)),
        };
        let platform = post.platform;
        let params = params.unwrap_or_else(|| DispatchParams::from_post(&post));

        let Some(publisher) = self.publishers.get(platform).cloned() else {
            let err = FanoutError::UnsupportedPlatform(platform.to_string());
            tracing::warn!(%post_id, %platform, "no publisher registered for platform");
            return self.finish(post_id, Completion::failed(err.to_string())).await;
        };

        let loaded;
        let meme = match meme {
            Some(m) => m,
            None => match self.memes.get_meme(post.meme_id).await {
                Ok(m) => {
                    loaded = m;
                    &loaded
                }
                Err(e @ FanoutError::NotFound { .. }) => {
                    tracing::warn!(%post_id, %platform, meme_id = %post.meme_id, "meme vanished before dispatch");
                    return self.finish(post_id, Completion::failed(e.to_string())).await;
                }
                Err(e) => {
                    self.posts.release(post_id, self.clock.now()).await?;
                    return Err(e);
                }
            },
        };

        let content = PublishContent {
            image_url: meme.image_url.clone(),
            caption: meme.caption_for(params.caption.as_deref()),
            hashtags: params.hashtags,
        };

        let result = tokio::time::timeout(self.settings.publish_timeout(), publisher.publish(&content))
            .await
            .unwrap_or(Err(AdapterError::Timeout));

        match result {
            Ok(published) => {
                tracing::info!(%post_id, %platform, external_post_id = %published.id, "post published");
                self.finish(
                    post_id,
                    Completion::Published {
                        external_post_id: published.id,
                        metrics: published.metrics,
                    },
                )
                .await
            }
            Err(err) => match mode {
                DispatchMode::MarkFailed => {
                    tracing::warn!(%post_id, %platform, error = %err, "publish failed");
                    self.finish(post_id, Completion::failed(err.to_string())).await
                }
                DispatchMode::Propagate => {
                    tracing::warn!(%post_id, %platform, error = %err, "publish failed, leaving retry to the scheduler");
                    self.posts.release(post_id, self.clock.now()).await?;
                    Err(FanoutError::Adapter(err))
                }
            },
        }
    }

    /// Mark a non-terminal Post FAILED. A Post that is already terminal is
    /// returned as it is.
    pub async fn fail_post(&self, post_id: PostId, reason: impl Into<String>) -> Result<Post, FanoutError> {
        self.finish(post_id, Completion::failed(reason)).await
    }

    async fn finish(&self, post_id: PostId, completion: Completion) -> Result<Post, FanoutError> {
        match self.posts.complete(post_id, completion, self.clock.now()).await? {
            Transition::Applied(post) => Ok(post),
            Transition::AlreadyTerminal(post) => {
                tracing::warn!(%post_id, status = %post.status, "post was completed concurrently, result dropped");
                Ok(post)
            }
        }
    }

    /// Cancel a SCHEDULED Post whose job has not started yet.
    pub async fn cancel_scheduled(&self, post_id: PostId) -> Result<CancelOutcome, FanoutError> {
        let post = self.posts.get(post_id).await?;
        if post.status != PostStatus::Scheduled {
            return Ok(CancelOutcome::TooLate(post));
        }

        if let Some(job_id) = post.job_id
            && !self.scheduler.cancel(job_id).await?
        {
            tracing::info!(%post_id, %job_id, "cancel requested after the job started");
            return Ok(CancelOutcome::TooLate(self.posts.get(post_id).await?));
        }

        match self
            .posts
            .complete(post_id, Completion::failed("cancelled"), self.clock.now())
            .await?
        {
            Transition::Applied(post) => {
                tracing::info!(%post_id, platform = %post.platform, "scheduled post cancelled");
                Ok(CancelOutcome::Cancelled(post))
            }
            Transition::AlreadyTerminal(post) => Ok(CancelOutcome::TooLate(post)),
        }
    }

    /// Re-enqueue Posts that were created but never reached the queue, or
    /// whose job ended without finishing them:
    /// - PENDING, unclaimed, older than the grace period: due now
    /// - SCHEDULED with no live job: due at `scheduled_at` (or now, if passed)
    pub async fn reconcile(&self) -> Result<ReconcileReport, FanoutError> {
        let now = self.clock.now();
        let grace = self.settings.reconcile_grace();
        let mut report = ReconcileReport::default();

        let mut stranded = Vec::new();
        for post in self.posts.list_by_status(PostStatus::Pending).await? {
            if post.is_claimed(now) || post.created_at + grace > now {
                continue;
            }
            if !self.has_live_job(&post).await? {
                stranded.push((post, now));
            }
        }
        for post in self.posts.list_by_status(PostStatus::Scheduled).await? {
            if !self.has_live_job(&post).await? {
                let due = post.scheduled_at.map_or(now, |at| at.max(now));
                stranded.push((post, due));
            }
        }

        for (post, due) in stranded {
            match self.schedule(&post, due).await {
                Ok(_) => {
                    tracing::info!(post_id = %post.id, platform = %post.platform, status = %post.status, "stranded post requeued");
                    report.requeued.push(post.id);
                }
                Err(e) => {
                    report
                        .errors
                        .push(DispatchFailure::from_error(post.platform.as_str(), &e, Some(post.id)));
                }
            }
        }
        Ok(report)
    }

    async fn has_live_job(&self, post: &Post) -> Result<bool, FanoutError> {
        let Some(job_id) = post.job_id else {
            return Ok(false);
        };
        Ok(self
            .scheduler
            .job(job_id)
            .await?
            .is_some_and(|job| !job.state.is_terminal()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::TimeZone;

    use crate::config::WorkersConfig;
    use crate::domain::{JobClass, JobPayload};
    use crate::impls::{InMemoryMemeStore, InMemoryPostStore, LoopbackPublisher};
    use crate::ports::{FixedClock, SystemClock, UlidGenerator};
    use crate::queue::{InMemoryJobQueue, JobQueue, JobState, QueueOptions, RetryPolicy};

    struct Harness {
        orchestrator: Orchestrator,
        posts: InMemoryPostStore,
        queue: Arc<InMemoryJobQueue>,
        meme: Meme,
    }

    async fn harness(clock: Arc<dyn Clock>, publishers: Vec<Arc<LoopbackPublisher>>) -> Harness {
        let memes = InMemoryMemeStore::new();
        let meme = Meme::new(MemeId::generate(), "https://cdn/meme.png", "when the build is green");
        memes.insert(meme.clone()).await;

        let posts = InMemoryPostStore::new();
        let queue = Arc::new(InMemoryJobQueue::new(
            RetryPolicy::default(),
            QueueOptions::default(),
            Arc::clone(&clock),
        ));

        let mut set = PublisherSet::new();
        for p in publishers {
            set.insert(p);
        }

        let orchestrator = Orchestrator::new(
            Arc::new(memes.clone()),
            Arc::new(posts.clone()),
            set,
            JobScheduler::new(queue.clone(), WorkersConfig::default()),
            Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            DispatchConfig::default(),
        );
        Harness {
            orchestrator,
            posts,
            queue,
            meme,
        }
    }

    fn loopback(platform: Platform) -> Arc<LoopbackPublisher> {
        Arc::new(LoopbackPublisher::new(platform))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn one_post_per_platform() {
        let h = harness(
            Arc::new(SystemClock),
            vec![loopback(Platform::Twitter), loopback(Platform::Reddit)],
        )
        .await;

        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["TWITTER", "REDDIT"], PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(DispatchOutcome::is_published));
        assert_eq!(h.posts.len().await, 2);

        let post = outcomes[0].post().unwrap();
        assert_eq!(post.platform, Platform::Twitter);
        assert_eq!(post.external_post_id.as_deref(), Some("twitter-1"));
        assert!(post.published_at.is_some());
        assert!(post.metrics.is_some());
    }

    #[tokio::test]
    async fn one_failing_adapter_does_not_affect_siblings() {
        let reddit = Arc::new(
            LoopbackPublisher::new(Platform::Reddit).failing(AdapterError::Platform {
                status: 403,
                message: "forbidden".into(),
            }),
        );
        let h = harness(
            Arc::new(SystemClock),
            vec![loopback(Platform::Twitter), reddit, loopback(Platform::Instagram)],
        )
        .await;

        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["TWITTER", "REDDIT", "INSTAGRAM"], PublishOptions::default())
            .await
            .unwrap();

        let statuses: Vec<_> = outcomes.iter().map(|o| o.status()).collect();
        assert_eq!(
            statuses,
            vec![
                Some(PostStatus::Published),
                Some(PostStatus::Failed),
                Some(PostStatus::Published)
            ]
        );
        let failed = outcomes[1].post().unwrap();
        assert_eq!(
            failed.failure_reason.as_deref(),
            Some("platform returned status 403: forbidden")
        );
        assert!(failed.external_post_id.is_none());
        assert!(failed.published_at.is_none());
    }

    #[tokio::test]
    async fn unknown_platform_is_rejected_alone() {
        let h = harness(Arc::new(SystemClock), vec![loopback(Platform::Twitter)]).await;

        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["FACEBOOK", "twitter"], PublishOptions::default())
            .await
            .unwrap();

        let rejected = outcomes[0].failure().unwrap();
        assert_eq!(rejected.platform, "FACEBOOK");
        assert_eq!(rejected.kind, FailureKind::UnsupportedPlatform);
        assert!(rejected.post_id.is_none());
        assert!(outcomes[1].is_published());
        assert_eq!(h.posts.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_platforms_collapse() {
        let tw = loopback(Platform::Twitter);
        let h = harness(Arc::new(SystemClock), vec![tw.clone()]).await;

        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["twitter", "TWITTER", " Twitter "], PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(tw.calls(), 1);
    }

    #[tokio::test]
    async fn missing_publisher_fails_the_post() {
        let h = harness(Arc::new(SystemClock), vec![loopback(Platform::Twitter)]).await;

        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["TIKTOK"], PublishOptions::default())
            .await
            .unwrap();

        let post = outcomes[0].post().unwrap();
        assert_eq!(post.status, PostStatus::Failed);
        assert_eq!(post.failure_reason.as_deref(), Some("unsupported platform: TIKTOK"));
    }

    #[tokio::test]
    async fn request_preconditions_fail_the_whole_call() {
        let h = harness(Arc::new(SystemClock), vec![loopback(Platform::Twitter)]).await;

        let empty: [&str; 0] = [];
        let err = h
            .orchestrator
            .request_publish(h.meme.id, &empty, PublishOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FanoutError::EmptyPlatforms));

        let err = h
            .orchestrator
            .request_publish(MemeId::generate(), &["TWITTER"], PublishOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FanoutError::NotFound { entity: "meme", .. }));
        assert!(h.posts.is_empty().await);
    }

    #[tokio::test]
    async fn caption_override_and_hashtags_reach_the_adapter() {
        let tw = loopback(Platform::Twitter);
        let h = harness(Arc::new(SystemClock), vec![tw]).await;

        let outcomes = h
            .orchestrator
            .request_publish(
                h.meme.id,
                &["TWITTER"],
                PublishOptions {
                    caption: Some("ship it".into()),
                    hashtags: vec!["#rust".into(), "#memes".into()],
                    ..PublishOptions::default()
                },
            )
            .await
            .unwrap();

        let metrics = outcomes[0].post().unwrap().metrics.clone().unwrap();
        assert_eq!(metrics["caption_chars"], 7);
        assert_eq!(metrics["hashtags"], 2);
    }

    #[tokio::test]
    async fn dispatching_a_terminal_post_is_a_no_op() {
        let tw = loopback(Platform::Twitter);
        let h = harness(Arc::new(SystemClock), vec![tw.clone()]).await;

        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["TWITTER"], PublishOptions::default())
            .await
            .unwrap();
        let first = outcomes[0].post().unwrap().clone();

        let again = h
            .orchestrator
            .dispatch(first.id, DispatchMode::MarkFailed)
            .await
            .unwrap();
        assert_eq!(again, first);
        assert_eq!(tw.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_dispatch_is_refused_while_claimed() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let h = harness(Arc::clone(&clock), vec![loopback(Platform::Reddit)]).await;
        let post = h
            .posts
            .create(Post::pending(PostId::generate(), h.meme.id, Platform::Reddit, clock.now()))
            .await
            .unwrap();
        h.posts
            .claim(post.id, clock.now(), chrono::Duration::minutes(5))
            .await
            .unwrap();

        let err = h
            .orchestrator
            .dispatch(post.id, DispatchMode::MarkFailed)
            .await
            .unwrap_err();
        assert!(matches!(err, FanoutError::DispatchInProgress(id) if id == post.id));
    }

    #[tokio::test]
    async fn propagate_mode_leaves_post_retryable() {
        let reddit = Arc::new(LoopbackPublisher::new(Platform::Reddit).failing(AdapterError::Network("reset".into())));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let h = harness(Arc::clone(&clock), vec![reddit]).await;
        let post = h
            .posts
            .create(Post::pending(PostId::generate(), h.meme.id, Platform::Reddit, clock.now()))
            .await
            .unwrap();

        let err = h
            .orchestrator
            .dispatch(post.id, DispatchMode::Propagate)
            .await
            .unwrap_err();
        assert!(matches!(err, FanoutError::Adapter(AdapterError::Network(_))));

        let stored = h.posts.get(post.id).await.unwrap();
        assert_eq!(stored.status, PostStatus::Pending);
        assert!(stored.claimed_until.is_none());
    }

    #[tokio::test]
    async fn future_schedule_creates_scheduled_post_without_adapter_call() {
        let clock = Arc::new(FixedClock::new(t0()));
        let tw = loopback(Platform::Twitter);
        let h = harness(clock.clone(), vec![tw.clone()]).await;
        let at = t0() + chrono::Duration::hours(1);

        let outcomes = h
            .orchestrator
            .request_publish(
                h.meme.id,
                &["TWITTER"],
                PublishOptions {
                    scheduled: Some(at),
                    ..PublishOptions::default()
                },
            )
            .await
            .unwrap();

        let post = outcomes[0].post().unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.scheduled_at, Some(at));
        assert_eq!(tw.calls(), 0);

        let job = h.queue.get(post.job_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(job.not_before, at);
        assert_eq!(PublishJob::decode(&job.payload).unwrap().post_id, post.id);
    }

    #[tokio::test]
    async fn past_schedule_dispatches_immediately() {
        let clock = Arc::new(FixedClock::new(t0()));
        let tw = loopback(Platform::Twitter);
        let h = harness(clock.clone(), vec![tw.clone()]).await;

        let outcomes = h
            .orchestrator
            .request_publish(
                h.meme.id,
                &["TWITTER"],
                PublishOptions {
                    scheduled: Some(t0()),
                    ..PublishOptions::default()
                },
            )
            .await
            .unwrap();

        let post = outcomes[0].post().unwrap();
        assert_eq!(post.status, PostStatus::Published);
        assert!(post.scheduled_at.is_none());
        assert_eq!(tw.calls(), 1);
    }

    #[tokio::test]
    async fn cancel_before_eligible_time() {
        let clock = Arc::new(FixedClock::new(t0()));
        let h = harness(clock.clone(), vec![loopback(Platform::Twitter)]).await;
        let outcomes = h
            .orchestrator
            .request_publish(
                h.meme.id,
                &["TWITTER"],
                PublishOptions {
                    scheduled: Some(t0() + chrono::Duration::hours(1)),
                    ..PublishOptions::default()
                },
            )
            .await
            .unwrap();
        let post = outcomes[0].post().unwrap().clone();

        let CancelOutcome::Cancelled(cancelled) = h.orchestrator.cancel_scheduled(post.id).await.unwrap() else {
            panic!("expected Cancelled");
        };
        assert_eq!(cancelled.status, PostStatus::Failed);
        assert_eq!(cancelled.failure_reason.as_deref(), Some("cancelled"));

        let job = h.queue.get(post.job_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);

        // Second cancel sees a terminal post
        assert!(matches!(
            h.orchestrator.cancel_scheduled(post.id).await.unwrap(),
            CancelOutcome::TooLate(_)
        ));
    }

    #[tokio::test]
    async fn cancel_after_job_started_is_too_late() {
        let clock = Arc::new(FixedClock::new(t0()));
        let h = harness(clock.clone(), vec![loopback(Platform::Twitter)]).await;
        let outcomes = h
            .orchestrator
            .request_publish(
                h.meme.id,
                &["TWITTER"],
                PublishOptions {
                    scheduled: Some(t0() + chrono::Duration::minutes(5)),
                    ..PublishOptions::default()
                },
            )
            .await
            .unwrap();
        let post_id = outcomes[0].post().unwrap().id;

        clock.advance(chrono::Duration::minutes(5));
        let _lease = h.queue.try_lease(JobClass::Publishing).await.unwrap().unwrap();

        let outcome = h.orchestrator.cancel_scheduled(post_id).await.unwrap();
        let CancelOutcome::TooLate(post) = outcome else {
            panic!("expected TooLate");
        };
        assert_eq!(post.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn reconcile_requeues_stranded_posts() {
        let clock = Arc::new(FixedClock::new(t0()));
        let h = harness(clock.clone(), vec![loopback(Platform::Twitter)]).await;

        // A PENDING row left behind by a crash, and a SCHEDULED row whose
        // enqueue never happened.
        let stale = h
            .posts
            .create(
                Post::pending(PostId::generate(), h.meme.id, Platform::Twitter, t0())
                    .with_request(Some("later".into()), vec!["#x".into()]),
            )
            .await
            .unwrap();
        let at = t0() + chrono::Duration::hours(3);
        let orphan = h
            .posts
            .create(Post::scheduled(PostId::generate(), h.meme.id, Platform::Twitter, at, t0()))
            .await
            .unwrap();

        // Inside the grace period only the scheduled row qualifies
        let report = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(report.requeued, vec![orphan.id]);

        clock.advance(chrono::Duration::minutes(2));
        let report = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(report.requeued, vec![stale.id]);
        assert!(report.errors.is_empty());

        let stale = h.posts.get(stale.id).await.unwrap();
        let job = h.queue.get(stale.job_id.unwrap()).await.unwrap().unwrap();
        let payload = PublishJob::decode(&job.payload).unwrap();
        assert_eq!(payload.caption.as_deref(), Some("later"));
        assert_eq!(payload.hashtags, vec!["#x".to_string()]);

        let orphan = h.posts.get(orphan.id).await.unwrap();
        let job = h.queue.get(orphan.job_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(job.not_before, at);

        // Nothing left to do
        assert!(h.orchestrator.reconcile().await.unwrap().requeued.is_empty());
    }

    #[tokio::test]
    async fn vanished_meme_fails_the_post() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let h = harness(Arc::clone(&clock), vec![loopback(Platform::Twitter)]).await;
        let post = h
            .posts
            .create(Post::pending(PostId::generate(), MemeId::generate(), Platform::Twitter, clock.now()))
            .await
            .unwrap();

        let post = h.orchestrator.dispatch(post.id, DispatchMode::Propagate).await.unwrap();
        assert_eq!(post.status, PostStatus::Failed);
        assert!(post.failure_reason.unwrap().contains("meme not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_latency_is_the_slowest_adapter() {
        let slow = |platform, ms| Arc::new(LoopbackPublisher::new(platform).with_delay(Duration::from_millis(ms)));
        let h = harness(
            Arc::new(SystemClock),
            vec![
                slow(Platform::Twitter, 100),
                slow(Platform::Reddit, 300),
                slow(Platform::Instagram, 200),
            ],
        )
        .await;

        let started = tokio::time::Instant::now();
        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["TWITTER", "REDDIT", "INSTAGRAM"], PublishOptions::default())
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(outcomes.iter().all(DispatchOutcome::is_published));
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_adapter_times_out() {
        let h = harness(
            Arc::new(SystemClock),
            vec![Arc::new(
                LoopbackPublisher::new(Platform::Tiktok).with_delay(Duration::from_secs(120)),
            )],
        )
        .await;

        let outcomes = h
            .orchestrator
            .request_publish(h.meme.id, &["TIKTOK"], PublishOptions::default())
            .await
            .unwrap();
        let post = outcomes[0].post().unwrap();
        assert_eq!(post.status, PostStatus::Failed);
        assert_eq!(post.failure_reason.as_deref(), Some("request timed out"));
    }
}
