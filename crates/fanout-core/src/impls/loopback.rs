//! LoopbackPublisher - a publisher that never leaves the process.
//!
//! Used by the CLI demo and tests: it answers like a platform would, can be
//! told to fail or to be slow, and counts its calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Platform;
use crate::error::AdapterError;
use crate::ports::{PublishContent, PublishResult, Publisher};

pub struct LoopbackPublisher {
    platform: Platform,
    failure: Option<AdapterError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl LoopbackPublisher {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            failure: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every publish fails with `error`.
    pub fn failing(mut self, error: AdapterError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Every publish takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of publish calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for LoopbackPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishResult, AdapterError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        Ok(PublishResult {
            id: format!("{}-{n}", self.platform.as_str().to_lowercase()),
            metrics: serde_json::json!({
                "caption_chars": content.caption.chars().count(),
                "hashtags": content.hashtags.len(),
            }),
        })
    }
}
