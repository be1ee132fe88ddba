//! Engine configuration.
//!
//! A plain `#[derive(Deserialize, Serialize, Default)]` tree, overlaid from a
//! base file plus an environment-specific file via the `config` crate. This
//! crate does not ship the concrete file loader (no on-disk layout to load
//! from), only the shape and a `from_sources` constructor tests can exercise
//! against in-memory sources.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poller: PollerConfig,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poller: PollerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Build configuration from a base source overlaid by an optional
    /// environment-specific source and `STAGECRAFT_*` environment
    /// variables, in that loading order.
    pub fn from_sources(base_toml: &str, env_toml: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(base_toml, FileFormat::Toml));
        if let Some(env_toml) = env_toml {
            builder = builder.add_source(File::from_str(env_toml, FileFormat::Toml));
        }
        builder = builder.add_source(Environment::with_prefix("STAGECRAFT").separator("__"));
        builder.build()?.try_deserialize()
    }
}

/// Worker poll-loop tuning: how many workers, how long to wait for a
/// message, and the queue's visibility timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    pub worker_count: usize,
    pub poll_interval_ms: u64,
    pub visibility_timeout_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            poll_interval_ms: 100,
            visibility_timeout_ms: 30_000,
        }
    }
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }
}

/// Backoff for `RunTask` re-enqueue and paused-stage re-checks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub default_backoff_ms: u64,
    pub paused_recheck_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_backoff_ms: 1_000,
            paused_recheck_ms: 5_000,
        }
    }
}

impl RetryConfig {
    pub fn default_backoff(&self) -> Duration {
        Duration::from_millis(self.default_backoff_ms)
    }

    pub fn paused_recheck(&self) -> Duration {
        Duration::from_millis(self.paused_recheck_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.poller.worker_count, 4);
        assert_eq!(config.retry.default_backoff_ms, 1_000);
    }

    #[test]
    fn from_sources_overlays_environment_over_base() {
        let base = r#"
            [poller]
            worker_count = 4
        "#;
        let env = r#"
            [poller]
            worker_count = 16
        "#;
        let config = EngineConfig::from_sources(base, Some(env)).unwrap();
        assert_eq!(config.poller.worker_count, 16);
    }

    #[test]
    fn from_sources_without_environment_keeps_base() {
        let base = r#"
            [retry]
            default_backoff_ms = 250
        "#;
        let config = EngineConfig::from_sources(base, None).unwrap();
        assert_eq!(config.retry.default_backoff_ms, 250);
        assert_eq!(config.poller.worker_count, 4);
    }
}
