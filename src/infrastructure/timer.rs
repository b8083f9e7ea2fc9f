use crate::types::{DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF};
use rand::Rng;
use std::time::Duration;

/// Bounds of the reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first retry, and the value backoff resets to
    pub min_delay: Duration,
    /// Ceiling no delay ever exceeds
    pub max_delay: Duration,
    /// Add up to half of the base delay as random jitter
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(DEFAULT_MIN_BACKOFF),
            max_delay: Duration::from_millis(DEFAULT_MAX_BACKOFF),
            jitter: true,
        }
    }
}

impl BackoffConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.min_delay.is_zero() {
            return Err("minimum reconnect delay must be > 0".to_string());
        }
        if self.max_delay < self.min_delay {
            return Err("maximum reconnect delay must be >= minimum reconnect delay".to_string());
        }
        Ok(())
    }
}

/// Timer for reconnection logic with exponential backoff.
///
/// The base delay doubles on every attempt up to `max_delay`. Jitter adds
/// less than half the base, so consecutive delays never decrease until
/// [`reset`](Self::reset) is called.
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);

        let delay = if self.config.jitter {
            let factor: f64 = rand::rng().random_range(0.0..0.5);
            base + base.mul_f64(factor)
        } else {
            base
        };
        delay.min(self.config.max_delay)
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.min(31));
        self.config
            .min_delay
            .saturating_mul(multiplier)
            .min(self.config.max_delay)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
