//! Retry policy for requests to the completion service.

use std::time::Duration;

/// Number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Wait before the first retry.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Factor applied to the wait after each further retry.
pub const DEFAULT_BACKOFF: f64 = 1.5;

/// No single wait is longer than this.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; zero disables retrying.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub cooldown: Duration,
    /// Multiplier applied per retry.
    pub backoff: f64,
    /// Upper bound on any single wait, including server-requested ones.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            cooldown: DEFAULT_COOLDOWN,
            backoff: DEFAULT_BACKOFF,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the cooldown and backoff factor.
    pub fn with_backoff(mut self, cooldown: Duration, backoff: f64) -> Self {
        self.cooldown = cooldown;
        self.backoff = backoff;
        self
    }

    /// How long to wait before retry number `attempt` (1-based).
    ///
    /// A `Retry-After` value from the server replaces the computed backoff.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after {
            return Duration::from_secs(seconds).min(self.max_delay);
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let seconds = self.cooldown.as_secs_f64() * self.backoff.powi(exponent);
        if !seconds.is_finite() || seconds < 0.0 {
            return self.max_delay;
        }
        Duration::from_secs_f64(seconds).min(self.max_delay)
    }
}
