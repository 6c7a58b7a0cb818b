//! Retry policy for failed summarization attempts.

use crate::errors::SummarizeError;
use std::time::Duration;

/// What the worker should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the job and republish it after `delay`.
    Retry {
        /// Backoff before the entry becomes deliverable again.
        delay: Duration,
    },
    /// Mark the job failed; no further automatic retry.
    GiveUp,
}

/// Classification of failures into retry-or-fail, consulted by the worker
/// after every attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of processing attempts per job.
    pub max_attempts: i32,
    /// Delay before a retried entry becomes deliverable again.
    pub retry_delay: Duration,
    /// Double the delay for each subsequent attempt instead of keeping it
    /// fixed.
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            exponential_backoff: false,
        }
    }
}

impl RetryPolicy {
    /// Decide the follow-up for a failure on attempt `attempts_made`
    /// (1-based, the value of the job's `attempt_count` after the claim).
    pub fn decide(&self, error: &SummarizeError, attempts_made: i32) -> RetryDecision {
        if !error.is_retryable() || attempts_made >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.delay_for(attempts_made),
        }
    }

    fn delay_for(&self, attempts_made: i32) -> Duration {
        if !self.exponential_backoff {
            return self.retry_delay;
        }
        let exponent = u32::try_from(attempts_made.saturating_sub(1)).unwrap_or(0);
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(exponent))
    }
}
