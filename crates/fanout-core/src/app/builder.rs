//! AppBuilder - wiring and startup validation.
//!
//! `build()` fails fast on wiring mistakes (a platform registered twice, an
//! expected platform with no publisher, a bad config) instead of letting the
//! first publish request discover them.

use std::sync::Arc;

use super::orchestrator::Orchestrator;
use super::publish_handler::PublishJobHandler;
use super::publishers::PublisherSet;
use super::scheduler::JobScheduler;
use crate::config::FanoutConfig;
use crate::domain::Platform;
use crate::error::FanoutError;
use crate::impls::InMemoryPostStore;
use crate::ports::{Clock, MemeSource, PostStore, Publisher, SystemClock, UlidGenerator};
use crate::queue::{InMemoryJobQueue, JobQueue};
use crate::runtime::{HandlerRegistry, JobHandler};
use crate::worker::WorkerPool;

/// ```ignore
/// let app = AppBuilder::new(config)
///     .memes(meme_store)
///     .publisher(twitter)
///     .publisher(reddit)
///     .expect_platforms(&[Platform::Twitter, Platform::Reddit])
///     .build()?;
/// let workers = app.start_workers();
/// ```
pub struct AppBuilder {
    config: FanoutConfig,
    clock: Arc<dyn Clock>,
    memes: Option<Arc<dyn MemeSource>>,
    posts: Option<Arc<dyn PostStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    publishers: PublisherSet,
    duplicate_publishers: Vec<Platform>,
    handlers: Vec<Arc<dyn JobHandler>>,
    expected_platforms: Option<Vec<Platform>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no meme source configured")]
    MissingMemeSource,

    #[error("publisher registered more than once for: {0:?}")]
    DuplicatePublisher(Vec<Platform>),

    #[error("missing publishers: {0:?}. These platforms were expected but not registered.")]
    MissingPublishers(Vec<Platform>),

    #[error("invalid configuration: {0}")]
    Config(FanoutError),

    #[error("handler registration failed: {0}")]
    Handler(FanoutError),
}

impl AppBuilder {
    pub fn new(config: FanoutConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            memes: None,
            posts: None,
            queue: None,
            publishers: PublisherSet::new(),
            duplicate_publishers: Vec::new(),
            handlers: Vec::new(),
            expected_platforms: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn memes(mut self, memes: Arc<dyn MemeSource>) -> Self {
        self.memes = Some(memes);
        self
    }

    /// Defaults to an in-memory store.
    pub fn posts(mut self, posts: Arc<dyn PostStore>) -> Self {
        self.posts = Some(posts);
        self
    }

    /// Defaults to an in-memory queue built from the retry and queue config.
    pub fn queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        let platform = publisher.platform();
        if self.publishers.insert(publisher).is_some() && !self.duplicate_publishers.contains(&platform) {
            self.duplicate_publishers.push(platform);
        }
        self
    }

    /// Extra job handlers (generation, batch). The publishing handler is
    /// always installed by `build()`.
    pub fn handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn expect_platforms(mut self, platforms: &[Platform]) -> Self {
        self.expected_platforms = Some(platforms.to_vec());
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate().map_err(BuildError::Config)?;

        if !self.duplicate_publishers.is_empty() {
            return Err(BuildError::DuplicatePublisher(self.duplicate_publishers));
        }
        if let Some(expected) = &self.expected_platforms {
            let missing: Vec<Platform> = expected
                .iter()
                .filter(|p| !self.publishers.contains(**p))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingPublishers(missing));
            }
        }
        let memes = self.memes.ok_or(BuildError::MissingMemeSource)?;

        let clock = self.clock;
        let posts = self
            .posts
            .unwrap_or_else(|| Arc::new(InMemoryPostStore::new()));
        let queue: Arc<dyn JobQueue> = match self.queue {
            Some(queue) => queue,
            None => Arc::new(InMemoryJobQueue::new(
                self.config.retry.policy(),
                self.config.queue_options().map_err(BuildError::Config)?,
                Arc::clone(&clock),
            )),
        };

        let scheduler = JobScheduler::new(queue, self.config.workers.clone());
        let orchestrator = Orchestrator::new(
            memes,
            posts,
            self.publishers,
            scheduler.clone(),
            Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            self.config.dispatch.clone(),
        );

        let mut registry = HandlerRegistry::new();
        registry
            .register(Arc::new(PublishJobHandler::new(orchestrator.clone())))
            .map_err(BuildError::Handler)?;
        for handler in self.handlers {
            registry.register(handler).map_err(BuildError::Handler)?;
        }

        Ok(App {
            config: self.config,
            orchestrator,
            scheduler,
            registry: Arc::new(registry),
        })
    }
}

/// A wired application: the publishing entry point plus the job runtime.
pub struct App {
    config: FanoutConfig,
    orchestrator: Orchestrator,
    scheduler: JobScheduler,
    registry: Arc<HandlerRegistry>,
}

impl App {
    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Spawn one worker group per class with a handler.
    pub fn start_workers(&self) -> WorkerPool {
        self.scheduler.start(Arc::clone(&self.registry))
    }
}
