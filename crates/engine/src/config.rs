//! Retry policy configuration for the transaction coordinator.

use std::time::Duration;

/// Default number of attempts for a contended transaction.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff before the first retry.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(5);

/// Default cap on the backoff between retries.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Retry policy for optimistic-transaction conflicts.
///
/// Backoff grows exponentially: `initial_backoff * multiplier^(attempt-1)`,
/// capped at `max_backoff`, with optional jitter to spread out herds of
/// conflicting writers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Cap on the backoff between retries.
    pub max_backoff: Duration,
    /// Exponential growth factor.
    pub multiplier: f64,
    /// Whether to randomize each backoff.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries; conflicts surface immediately.
    /// Used by tests that assert on first-attempt behavior.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Sets the total attempt budget (minimum 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the backoff before the first retry.
    #[must_use]
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Sets the cap on the backoff between retries.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets the exponential growth factor.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enables or disables backoff jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}
