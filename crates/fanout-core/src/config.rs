//! Runtime configuration loaded from `fanout.toml`.
//!
//! Every field has a default, so a partial (or missing) file is fine.
//! `FANOUT_*` environment variables take precedence over the file.

use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::domain::JobClass;
use crate::error::FanoutError;
use crate::queue::{QueueOptions, RetryPolicy};

/// Upper bound for every TTL and grace period, in seconds (7 days).
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

fn ttl(name: &str, secs: u64) -> Result<TimeDelta, FanoutError> {
    if secs > MAX_TTL_SECS {
        return Err(FanoutError::Config(format!("{name} must be at most {MAX_TTL_SECS}s")));
    }
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| FanoutError::Config(format!("{name} is out of range")))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FanoutConfig {
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Concurrency ceiling per job class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_generation_workers")]
    pub generation: usize,
    #[serde(default = "default_publishing_workers")]
    pub publishing: usize,
    #[serde(default = "default_batch_workers")]
    pub batch: usize,
}

fn default_generation_workers() -> usize {
    5
}

fn default_publishing_workers() -> usize {
    10
}

fn default_batch_workers() -> usize {
    2
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            generation: default_generation_workers(),
            publishing: default_publishing_workers(),
            batch: default_batch_workers(),
        }
    }
}

impl WorkersConfig {
    pub fn concurrency(&self, class: JobClass) -> usize {
        match class {
            JobClass::Generation => self.generation,
            JobClass::Publishing => self.publishing,
            JobClass::Batch => self.batch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Attempts per job, the first run included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    300_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            self.multiplier,
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on a single adapter call.
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// How long a dispatch attempt holds a post.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,

    /// A PENDING post younger than this is assumed to still be in flight.
    #[serde(default = "default_reconcile_grace_secs")]
    pub reconcile_grace_secs: u64,
}

fn default_publish_timeout_secs() -> u64 {
    30
}

fn default_claim_ttl_secs() -> u64 {
    300
}

fn default_reconcile_grace_secs() -> u64 {
    60
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            publish_timeout_secs: default_publish_timeout_secs(),
            claim_ttl_secs: default_claim_ttl_secs(),
            reconcile_grace_secs: default_reconcile_grace_secs(),
        }
    }
}

impl DispatchConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Clamped to `MAX_TTL_SECS`; `FanoutConfig::validate` rejects larger values.
    pub fn claim_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(self.claim_ttl_secs.min(MAX_TTL_SECS) as i64)
    }

    pub fn reconcile_grace(&self) -> TimeDelta {
        TimeDelta::seconds(self.reconcile_grace_secs.min(MAX_TTL_SECS) as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

fn default_lease_ttl_secs() -> u64 {
    600
}

fn default_idle_poll_ms() -> u64 {
    500
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl_secs(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "fanout_core=debug".
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl FanoutConfig {
    /// Load from `path` (or `fanout.toml` in the working directory), then
    /// apply environment overrides. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, FanoutError> {
        let path = path.unwrap_or_else(|| Path::new("fanout.toml"));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| FanoutError::Config(format!("{}: {e}", path.display())))?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, FanoutError> {
        toml::from_str(contents).map_err(|e| FanoutError::Config(e.to_string()))
    }

    /// Apply `FANOUT_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), FanoutError> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, FanoutError> {
            value
                .trim()
                .parse()
                .map_err(|_| FanoutError::Config(format!("{key}: invalid value {value:?}")))
        }

        if let Some(v) = lookup("FANOUT_WORKERS_GENERATION") {
            self.workers.generation = parse("FANOUT_WORKERS_GENERATION", &v)?;
        }
        if let Some(v) = lookup("FANOUT_WORKERS_PUBLISHING") {
            self.workers.publishing = parse("FANOUT_WORKERS_PUBLISHING", &v)?;
        }
        if let Some(v) = lookup("FANOUT_WORKERS_BATCH") {
            self.workers.batch = parse("FANOUT_WORKERS_BATCH", &v)?;
        }
        if let Some(v) = lookup("FANOUT_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse("FANOUT_RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("FANOUT_PUBLISH_TIMEOUT_SECS") {
            self.dispatch.publish_timeout_secs = parse("FANOUT_PUBLISH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("FANOUT_LOG_LEVEL")
            && !v.is_empty()
        {
            self.logging.level = v;
        }
        if let Some(v) = lookup("FANOUT_LOG_FORMAT") {
            self.logging.format = match v.trim().to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(FanoutError::Config(format!("FANOUT_LOG_FORMAT: invalid value {v:?}"))),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), FanoutError> {
        let workers = [
            ("generation", self.workers.generation),
            ("publishing", self.workers.publishing),
            ("batch", self.workers.batch),
        ];
        for (name, n) in workers {
            if n == 0 {
                return Err(FanoutError::Config(format!("workers.{name} must be at least 1")));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(FanoutError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(FanoutError::Config("retry.multiplier must be >= 1.0".into()));
        }

        ttl("queue.lease_ttl_secs", self.queue.lease_ttl_secs)?;
        ttl("dispatch.claim_ttl_secs", self.dispatch.claim_ttl_secs)?;
        ttl("dispatch.reconcile_grace_secs", self.dispatch.reconcile_grace_secs)?;

        // A claim must outlive the adapter call it guards, and a job lease
        // must outlive the claim its worker holds.
        if self.dispatch.claim_ttl_secs <= self.dispatch.publish_timeout_secs {
            return Err(FanoutError::Config(
                "dispatch.claim_ttl_secs must be greater than dispatch.publish_timeout_secs".into(),
            ));
        }
        if self.queue.lease_ttl_secs < self.dispatch.claim_ttl_secs {
            return Err(FanoutError::Config(
                "queue.lease_ttl_secs must be at least dispatch.claim_ttl_secs".into(),
            ));
        }
        Ok(())
    }

    pub fn queue_options(&self) -> Result<QueueOptions, FanoutError> {
        Ok(QueueOptions {
            max_attempts: self.retry.max_attempts,
            lease_ttl: ttl("queue.lease_ttl_secs", self.queue.lease_ttl_secs)?,
            idle_poll: Duration::from_millis(self.queue.idle_poll_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use rstest::rstest;

    #[test]
    fn default_config_values() {
        let config = FanoutConfig::default();
        assert_eq!(config.workers.concurrency(JobClass::Generation), 5);
        assert_eq!(config.workers.concurrency(JobClass::Publishing), 10);
        assert_eq!(config.workers.concurrency(JobClass::Batch), 2);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.dispatch.publish_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.format, LogFormat::Text);
        config.validate().unwrap();
    }

    #[test]
    fn deserialize_partial_toml() {
        let config = FanoutConfig::from_toml(
            r#"
            [workers]
            publishing = 4

            [logging]
            format = "json"
        "#,
        )
        .unwrap();
        assert_eq!(config.workers.publishing, 4);
        assert_eq!(config.workers.generation, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = FanoutConfig::from_toml("[workers]\nbatch = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers.batch"));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FANOUT_WORKERS_PUBLISHING", "3"),
            ("FANOUT_LOG_FORMAT", "JSON"),
        ]);
        let mut config = FanoutConfig::from_toml("[workers]\npublishing = 8\n").unwrap();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.workers.publishing, 3);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut config = FanoutConfig::default();
        let err = config
            .apply_env(|k| (k == "FANOUT_WORKERS_BATCH").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, FanoutError::Config(_)));
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let config = FanoutConfig::load(Some(Path::new("does-not-exist.toml"))).unwrap();
        assert_eq!(config.queue_options().unwrap().max_attempts, config.retry.max_attempts);
    }

    #[rstest]
    #[case::claim_shorter_than_timeout("[dispatch]\nclaim_ttl_secs = 1\npublish_timeout_secs = 30\n", "dispatch.claim_ttl_secs")]
    #[case::claim_equal_to_timeout("[dispatch]\nclaim_ttl_secs = 30\npublish_timeout_secs = 30\n", "dispatch.claim_ttl_secs")]
    #[case::lease_shorter_than_claim("[queue]\nlease_ttl_secs = 120\n[dispatch]\nclaim_ttl_secs = 300\n", "queue.lease_ttl_secs")]
    fn ttl_ordering_is_enforced(#[case] toml: &str, #[case] field: &str) {
        let err = FanoutConfig::from_toml(toml).unwrap().validate().unwrap_err();
        assert!(matches!(&err, FanoutError::Config(msg) if msg.starts_with(field)), "{err}");
    }

    #[rstest]
    #[case::lease("[queue]\nlease_ttl_secs = 10000000000000\n", "queue.lease_ttl_secs")]
    #[case::claim("[dispatch]\nclaim_ttl_secs = 10000000000000\n", "dispatch.claim_ttl_secs")]
    #[case::grace("[dispatch]\nreconcile_grace_secs = 10000000000000\n", "dispatch.reconcile_grace_secs")]
    fn oversized_ttls_are_rejected(#[case] toml: &str, #[case] field: &str) {
        let config = FanoutConfig::from_toml(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(&err, FanoutError::Config(msg) if msg.starts_with(field)), "{err}");
    }

    #[test]
    fn oversized_lease_ttl_is_an_error_not_a_panic() {
        let config = FanoutConfig::from_toml("[queue]\nlease_ttl_secs = 10000000000000\n").unwrap();
        assert!(matches!(config.queue_options(), Err(FanoutError::Config(_))));

        let dispatch = DispatchConfig {
            claim_ttl_secs: u64::MAX,
            ..DispatchConfig::default()
        };
        assert_eq!(dispatch.claim_ttl(), TimeDelta::seconds(MAX_TTL_SECS as i64));
    }

    #[test]
    fn ttls_at_the_bound_are_accepted() {
        let mut config = FanoutConfig::default();
        config.queue.lease_ttl_secs = MAX_TTL_SECS;
        config.dispatch.claim_ttl_secs = MAX_TTL_SECS;
        config.dispatch.reconcile_grace_secs = MAX_TTL_SECS;
        config.validate().unwrap();
        assert_eq!(config.queue_options().unwrap().lease_ttl, TimeDelta::days(7));
    }
}
