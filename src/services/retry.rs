//! Retry policy for failed task executions.
//!
//! Backoff is linear and deterministic: attempt `n` waits `base * n`.
//! Terminal failures (unsupported task, malformed parameters, handler
//! "not applicable") bypass the retry budget entirely.

use std::time::Duration;

use crate::domain::errors::TaskError;
use crate::domain::models::{RetryConfig, Task};

/// Decides whether a failed task re-enters the queue and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Whether this failure should be retried.
    ///
    /// True while the error is retryable and `task.attempts` is below
    /// `max_retries`; exhaustion or a terminal error means permanent
    /// failure.
    pub fn should_retry(&self, task: &Task, error: &TaskError) -> bool {
        error.is_retryable() && task.attempts < self.config.max_retries
    }

    /// Delay before re-enqueueing attempt number `attempts`.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        Duration::from_millis(self.config.backoff_base_ms.saturating_mul(u64::from(attempts)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
