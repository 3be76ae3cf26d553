//! Dispatch queue configuration
//!
//! Defaults suit a single notification mailer; every knob can be overridden
//! from the environment with a `COURIER_` variable.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::backoff::BackoffPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Base retry delay (env: COURIER_BACKOFF_BASE_MS)
    pub backoff_base_ms: u64,
    /// Upper bound on a single retry delay (env: COURIER_BACKOFF_MAX_MS)
    pub backoff_max_ms: Option<u64>,
    /// Attempt budget for jobs enqueued without one (env: COURIER_MAX_ATTEMPTS)
    pub default_max_attempts: u32,
    /// Pause between loop iterations (env: COURIER_YIELD_MS)
    pub yield_ms: u64,
    /// Per-attempt deadline for the delivery adapter (env: COURIER_ATTEMPT_TIMEOUT_MS)
    pub attempt_timeout_ms: Option<u64>,
    /// Reject enqueues beyond this many queued jobs (env: COURIER_MAX_QUEUE_LENGTH)
    pub max_queue_length: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1000,
            backoff_max_ms: None,
            default_max_attempts: 3,
            yield_ms: 100,
            attempt_timeout_ms: None,
            max_queue_length: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl QueueConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backoff_base_ms: env_parse("COURIER_BACKOFF_BASE_MS")
                .unwrap_or(defaults.backoff_base_ms),
            backoff_max_ms: env_parse("COURIER_BACKOFF_MAX_MS"),
            default_max_attempts: env_parse("COURIER_MAX_ATTEMPTS")
                .unwrap_or(defaults.default_max_attempts),
            yield_ms: env_parse("COURIER_YIELD_MS").unwrap_or(defaults.yield_ms),
            attempt_timeout_ms: env_parse("COURIER_ATTEMPT_TIMEOUT_MS"),
            max_queue_length: env_parse("COURIER_MAX_QUEUE_LENGTH"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "default_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_queue_length == Some(0) {
            return Err(ConfigError::Invalid(
                "max_queue_length must be at least 1 when set".to_string(),
            ));
        }
        if self.attempt_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "attempt_timeout_ms must be positive when set".to_string(),
            ));
        }
        if let Some(max) = self.backoff_max_ms {
            if max < self.backoff_base_ms {
                return Err(ConfigError::Invalid(format!(
                    "backoff_max_ms ({max}) is below backoff_base_ms ({})",
                    self.backoff_base_ms
                )));
            }
        }
        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(self.backoff_base_ms),
            max_delay: self.backoff_max_ms.map(Duration::from_millis),
        }
    }

    pub fn yield_pause(&self) -> Duration {
        Duration::from_millis(self.yield_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}
