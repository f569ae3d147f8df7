//! Configuration loading and representation.

use std::time::Duration;

use thiserror::Error;

pub const ENV_JOB_THREAD_PREFIX: &str = "SVCBROKER_JOB_THREAD_PREFIX";
pub const ENV_SUBSCRIBER_POLL_MS: &str = "SVCBROKER_SUBSCRIBER_POLL_MS";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Broker runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Job threads are named `<prefix>-<token>`.
    pub job_thread_prefix: String,
    /// How long a result subscriber waits before re-checking for shutdown.
    pub subscriber_poll_interval: Duration,
    /// `tracing` filter directives.
    pub log_filter: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            job_thread_prefix: "provision-job".to_string(),
            subscriber_poll_interval: Duration::from_millis(250),
            log_filter: svcbroker_observability::tracing::DEFAULT_FILTER.to_string(),
        }
    }
}

impl BrokerConfig {
    /// Read settings from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(prefix) = lookup(ENV_JOB_THREAD_PREFIX) {
            let trimmed = prefix.trim();
            if trimmed.is_empty() || trimmed.contains('\0') {
                return Err(ConfigError::InvalidValue {
                    key: ENV_JOB_THREAD_PREFIX,
                    value: prefix,
                    reason: "must be a non-empty thread name".to_string(),
                });
            }
            config.job_thread_prefix = trimmed.to_string();
        }

        if let Some(raw) = lookup(ENV_SUBSCRIBER_POLL_MS) {
            let ms: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: ENV_SUBSCRIBER_POLL_MS,
                value: raw.clone(),
                reason: format!("{e}"),
            })?;
            if ms == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_SUBSCRIBER_POLL_MS,
                    value: raw,
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.subscriber_poll_interval = Duration::from_millis(ms);
        }

        if let Some(directives) = lookup(ENV_LOG_FILTER) {
            svcbroker_observability::tracing::validate_filter(&directives).map_err(|reason| {
                ConfigError::InvalidValue {
                    key: ENV_LOG_FILTER,
                    value: directives.clone(),
                    reason,
                }
            })?;
            config.log_filter = directives;
        }

        Ok(config)
    }

    /// Install process-wide logging with this config's filter.
    pub fn init_logging(&self) {
        svcbroker_observability::tracing::init_with_filter(&self.log_filter);
    }
}
