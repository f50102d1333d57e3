//! Publisher port - one adapter per destination platform.
//!
//! The orchestrator sees every platform through this one shape; wire
//! protocols live behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Platform;
use crate::error::AdapterError;

/// What gets published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishContent {
    pub image_url: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// What the platform hands back on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Platform-side post id.
    pub id: String,

    /// Platform-specific metrics; stored verbatim, never interpreted.
    #[serde(default)]
    pub metrics: serde_json::Value,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Destination this adapter publishes to.
    fn platform(&self) -> Platform;

    async fn publish(&self, content: &PublishContent) -> Result<PublishResult, AdapterError>;
}
