//! Retry policy for outbox publication.

use std::time::Duration;

/// Geometric backoff between publish attempts.
///
/// Attempt `n` (1-indexed) that fails is followed by a delay of
/// `initial_delay * backoff_factor^(n-1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total tries per entry per cycle, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let initial_ms = self.initial_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = self.backoff_factor.max(1.0).powi((attempt - 1) as i32);
        let delay_ms = (initial_ms * exp).min(max_ms);

        Duration::from_millis(delay_ms.max(0.0) as u64)
    }

    /// Whether another try is allowed after `attempt` tries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
