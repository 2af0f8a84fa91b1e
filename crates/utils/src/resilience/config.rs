//! Configuration for retry behaviour.

use std::time::Duration;
use taskmill_core::{
    Error, Result, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_UNIT_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_BACKOFF_SECS,
};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of times the operation may be invoked
    pub max_attempts: usize,
    /// Exponential base; the delay after attempt `i` is `backoff_unit * base^i`
    pub backoff_base: f64,
    /// Length of one backoff step
    pub backoff_unit: Duration,
    /// Upper bound for a single backoff delay
    pub max_backoff: Duration,
    /// Time budget for a single attempt
    pub attempt_timeout: Option<Duration>,
    /// Time budget for the whole run, including remediation and backoff
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_unit: Duration::from_millis(DEFAULT_BACKOFF_UNIT_MS),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
            attempt_timeout: None,
            deadline: None,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the failed attempt with the given zero-based index
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.backoff_unit.as_secs_f64() * self.backoff_base.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Reject settings the retry loop cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::configuration("retry max_attempts must be at least 1"));
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
            return Err(Error::configuration(format!(
                "retry backoff_base must be a finite number >= 1.0, got {}",
                self.backoff_base
            )));
        }
        if matches!(self.attempt_timeout, Some(limit) if limit.is_zero()) {
            return Err(Error::configuration("retry attempt_timeout must be non-zero"));
        }
        if matches!(self.deadline, Some(limit) if limit.is_zero()) {
            return Err(Error::configuration("retry deadline must be non-zero"));
        }
        Ok(())
    }
}
