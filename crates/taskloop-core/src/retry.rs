//! Retry policy applied by the scheduler loop when a handler fails.
//!
//! A failed task is re-appended to the queue tail and the loop waits for the
//! policy's backoff before it continues draining.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Strategy for computing backoff durations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Delay = retry_delay * attempt
    #[default]
    Linear,
    /// Delay = retry_delay * 2^(attempt - 1)
    Exponential,
}

/// Policy controlling how failed tasks are retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first execution.
    pub max_retries: u32,
    /// Base delay between retries.
    pub retry_delay: Duration,
    /// Upper bound on a single backoff, if any.
    pub max_backoff: Option<Duration>,
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration, strategy: BackoffStrategy) -> Self {
        RetryPolicy {
            max_retries,
            retry_delay,
            max_backoff: None,
            strategy,
        }
    }

    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = Some(max);
        self
    }

    /// Whether a task that has already been retried `attempts` times gets another go.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// Backoff before the given retry attempt (1-based).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = match self.strategy {
            BackoffStrategy::Linear => self.retry_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let exp = attempt.saturating_sub(1);
                let factor = if exp < 32 { 1_u32 << exp } else { u32::MAX };
                self.retry_delay.saturating_mul(factor)
            }
        };
        match self.max_backoff {
            Some(max) if base > max => max,
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_scales_with_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), BackoffStrategy::Linear);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(50), BackoffStrategy::Exponential)
            .with_max_backoff(Duration::from_millis(400));
        // 1 -> 50ms, 2 -> 100ms, 3 -> 200ms, 4 -> 400ms, capped thereafter
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(50));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(4), Duration::from_millis(400));
        assert_eq!(policy.backoff_duration(9), Duration::from_millis(400));
    }

    #[test]
    fn test_should_retry_stops_at_limit() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10), BackoffStrategy::Linear);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        let no_retries = RetryPolicy::new(0, Duration::ZERO, BackoffStrategy::Linear);
        assert!(!no_retries.should_retry(0));
    }
}
