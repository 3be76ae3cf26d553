//! Retry backoff policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maps the number of attempts already made to the wait before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Same delay between every attempt
    Constant { delay: Duration },
    /// `base * 2^(attempt - 1)`, optionally capped at `max_delay`
    Exponential {
        base: Duration,
        max_delay: Option<Duration>,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max_delay: None,
        }
    }
}

impl BackoffPolicy {
    pub fn exponential(base: Duration) -> Self {
        Self::Exponential {
            base,
            max_delay: None,
        }
    }

    /// Delay before the attempt following `attempt`.
    ///
    /// Attempt 0 is treated as attempt 1. The exponential branch saturates
    /// at `Duration::MAX` instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Constant { delay } => delay,
            Self::Exponential { base, max_delay } => {
                let exponent = attempt.max(1) - 1;
                let delay = 2u32
                    .checked_pow(exponent)
                    .map_or(Duration::MAX, |factor| base.saturating_mul(factor));
                match max_delay {
                    Some(cap) => delay.min(cap),
                    None => delay,
                }
            }
        }
    }
}

/// Whole milliseconds in `delay`, saturating at `u64::MAX`.
pub(crate) fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_doubles_from_base() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(1000));
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert_eq!(policy.delay(4), Duration::from_millis(8000));
    }

    #[test]
    fn test_attempt_zero_uses_base() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(250));
        assert_eq!(policy.delay(0), Duration::from_millis(250));
    }

    #[test]
    fn test_max_delay_caps() {
        let policy = BackoffPolicy::Exponential {
            base: Duration::from_secs(60),
            max_delay: Some(Duration::from_secs(300)),
        };
        assert_eq!(policy.delay(3), Duration::from_secs(240));
        assert_eq!(policy.delay(4), Duration::from_secs(300));
        assert_eq!(policy.delay(40), Duration::from_secs(300));
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let policy = BackoffPolicy::exponential(Duration::from_secs(1));
        assert_eq!(policy.delay(u32::MAX), Duration::MAX);
        assert_eq!(policy.delay(64), Duration::MAX);
    }

    #[test]
    fn test_constant() {
        let policy = BackoffPolicy::Constant {
            delay: Duration::from_millis(5),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(5));
        assert_eq!(policy.delay(10), Duration::from_millis(5));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
