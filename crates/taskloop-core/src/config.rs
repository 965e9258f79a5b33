//! Scheduler configuration.

use crate::error::SchedulerError;
use crate::retry::{BackoffStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Scheduler`](crate::Scheduler).
///
/// Every field has a default, so the struct can be deserialized from a partial
/// section of a larger config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks waiting in the queue.
    pub max_queue_size: usize,
    /// Tasks processed per second; the loop pauses `1000 / rate` ms after each task.
    /// Zero disables pacing.
    pub processing_rate_per_sec: u32,
    /// Retries allowed after the first execution of a task.
    pub max_retry_attempts: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    pub backoff: BackoffStrategy,
    pub max_backoff_ms: Option<u64>,
    /// Number of terminal tasks kept in history. `None` keeps everything.
    pub history_capacity: Option<usize>,
    /// Fail a handler that runs longer than this. `None` waits forever.
    pub handler_timeout_ms: Option<u64>,
    /// Buffer size of the task event channel.
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            processing_rate_per_sec: 10,
            max_retry_attempts: 3,
            retry_delay_ms: 1000,
            backoff: BackoffStrategy::Linear,
            max_backoff_ms: None,
            history_capacity: None,
            handler_timeout_ms: None,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_processing_rate(mut self, per_sec: u32) -> Self {
        self.processing_rate_per_sec = per_sec;
        self
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = duration_to_ms(delay);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff_ms = Some(duration_to_ms(max));
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout_ms = Some(duration_to_ms(timeout));
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check the values that would make the scheduler unusable.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_queue_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_queue_size must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the retry policy described by this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.max_retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
            self.backoff,
        );
        match self.max_backoff_ms {
            Some(ms) => policy.with_max_backoff(Duration::from_millis(ms)),
            None => policy,
        }
    }

    /// Fixed pause between tasks, `None` when pacing is disabled.
    pub fn pacing_delay(&self) -> Option<Duration> {
        match self.processing_rate_per_sec {
            0 => None,
            rate => Some(Duration::from_millis(1000 / u64::from(rate))),
        }
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
