//! Exponential backoff policy for reconnect scheduling.
//!
//! `delay = min(base * factor^attempt, max)`. The attempt counter moves one
//! step per scheduled retry and resets only on a successful open, so the
//! delay sequence within one failure episode is monotonically non-decreasing
//! and capped.

use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};

/// Reconnect backoff state machine.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    factor: f64,
    max_delay: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_BASE_DELAY,
            DEFAULT_BACKOFF_FACTOR,
            DEFAULT_MAX_DELAY,
            DEFAULT_MAX_ATTEMPTS,
        )
    }
}

impl ReconnectPolicy {
    /// Create a policy with explicit parameters.
    pub fn new(base_delay: Duration, factor: f64, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            factor: factor.max(1.0),
            max_delay,
            max_attempts,
            attempt: 0,
        }
    }

    /// Number of retries scheduled since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay the next scheduled retry would use, without consuming it.
    pub fn peek_delay(&self) -> Duration {
        self.delay_for(self.attempt)
    }

    /// Whether the retry budget is spent.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Consume one retry: returns the delay for this attempt and advances
    /// the counter (saturating at the configured ceiling).
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1).min(self.max_attempts);
        delay
    }

    /// Reset after a successful open.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        // factor^attempt overflows f64 well past the cap; clamp the exponent
        let exponent = attempt.min(64) as i32;
        let raw = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

// =============================================================================
// Tests
// =============================================================================
