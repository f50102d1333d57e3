//! Job classes and typed job payloads.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ids::{MemeId, PostId};

/// A named category of deferred work with its own concurrency ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    Generation,
    Publishing,
    Batch,
}

impl JobClass {
    pub const ALL: [JobClass; 3] = [JobClass::Generation, JobClass::Publishing, JobClass::Batch];

    /// Queue name used in logs.
    pub fn queue_name(self) -> &'static str {
        match self {
            JobClass::Generation => "meme-generation",
            JobClass::Publishing => "publishing",
            JobClass::Batch => "batch-processing",
        }
    }
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// Binds a payload type to the job class that carries it.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Thumbnail { meme_id: MemeId }
///
/// impl JobPayload for Thumbnail {
///     const CLASS: JobClass = JobClass::Generation;
/// }
/// ```
pub trait JobPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const CLASS: JobClass;

    fn encode(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn decode(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }
}

/// Deferred single-destination dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishJob {
    pub post_id: PostId,
    pub meme_id: MemeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
}

impl JobPayload for PublishJob {
    const CLASS: JobClass = JobClass::Publishing;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_job_decodes_without_optional_fields() {
        let job = PublishJob {
            post_id: PostId::generate(),
            meme_id: MemeId::generate(),
            caption: None,
            hashtags: vec![],
        };
        let value = job.encode().unwrap();
        assert!(value.get("caption").is_none());
        assert!(value.get("hashtags").is_none());
        assert_eq!(PublishJob::decode(&value).unwrap(), job);
    }

    #[test]
    fn classes_have_distinct_queue_names() {
        let names: std::collections::HashSet<_> =
            JobClass::ALL.iter().map(|c| c.queue_name()).collect();
        assert_eq!(names.len(), JobClass::ALL.len());
    }
}
