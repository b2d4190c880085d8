//! Retry with backoff for the start page load
//!
//! Only the first navigation of a discovery run is retried this way; later
//! probe failures are absorbed by the scroll detector and the validator.

use crate::error::Error;
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often and how patiently to retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Type of backoff strategy
    pub backoff: BackoffType,
    /// Delay after the first failure
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffType::Exponential,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Calculate backoff delay after the given (0-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial = Duration::from_millis(self.initial_backoff_ms);
        let delay = match self.backoff {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => initial.saturating_mul(2u32.saturating_pow(attempt)),
        };

        std::cmp::min(delay, Duration::from_millis(self.max_backoff_ms))
    }

    /// Delay before retrying after `error` on the given (0-based) attempt,
    /// or `None` when the error is permanent or attempts are used up
    pub fn retry_after(&self, error: &Error, attempt: u32) -> Option<Duration> {
        if error.is_transient() && attempt + 1 < self.max_attempts.max(1) {
            Some(self.delay_for(attempt))
        } else {
            None
        }
    }
}
