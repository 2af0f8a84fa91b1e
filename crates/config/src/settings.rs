//! Settings model shared by the scheduler, cache and retry layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use taskmill_core::{
    Error, FailurePolicy, Result, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_UNIT_MS,
    DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL_SECS, DEFAULT_CONCURRENCY,
    DEFAULT_CONNECTION_WAIT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_SECS,
};
use taskmill_utils::{DefaultRemediations, RetryConfig, XdgPaths};

/// Complete taskmill configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
}

impl Settings {
    /// Check every section, reporting the first invalid value
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.cache.validate()?;
        self.retry.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Maximum number of units executing at once
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Wall-clock budget for one batch
    pub timeout_secs: Option<u64>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::default(),
            timeout_secs: None,
        }
    }
}

impl SchedulerSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::configuration("scheduler.concurrency must be at least 1"));
        }
        if self.timeout_secs == Some(0) {
            return Err(Error::configuration("scheduler.timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Snapshot location; the XDG cache directory when unset
    pub path: Option<PathBuf>,
    pub ttl_secs: u64,
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_size: DEFAULT_CACHE_MAX_SIZE,
        }
    }
}

impl CacheSettings {
    /// Snapshot path with the XDG default applied
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(XdgPaths::cache_file)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(Error::configuration("cache.ttl_secs must be at least 1"));
        }
        if self.max_size == 0 {
            return Err(Error::configuration("cache.max_size must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total invocations allowed per operation
    pub max_attempts: usize,
    pub backoff_base: f64,
    pub backoff_unit_ms: u64,
    pub max_backoff_secs: u64,
    pub attempt_timeout_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    /// Pause before retrying a transient connection failure
    pub connection_wait_secs: u64,
    /// Command used to install a missing dependency, e.g. `["pip", "install"]`
    pub installer: Option<Vec<String>>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_unit_ms: DEFAULT_BACKOFF_UNIT_MS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            attempt_timeout_secs: None,
            deadline_secs: None,
            connection_wait_secs: DEFAULT_CONNECTION_WAIT_SECS,
            installer: None,
        }
    }
}

impl RetrySettings {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::configuration("retry.max_attempts must be at least 1"));
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
            return Err(Error::configuration(format!(
                "retry.backoff_base must be >= 1.0, got {}",
                self.backoff_base
            )));
        }
        if matches!(&self.installer, Some(command) if command.is_empty()) {
            return Err(Error::configuration("retry.installer must name a program"));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            backoff_base: self.backoff_base,
            backoff_unit: Duration::from_millis(self.backoff_unit_ms),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            attempt_timeout: self.attempt_timeout_secs.map(Duration::from_secs),
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }

    pub fn default_remediations(&self) -> DefaultRemediations {
        DefaultRemediations {
            connection_wait: Duration::from_secs(self.connection_wait_secs),
            installer: self.installer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.scheduler.concurrency, 5);
        assert_eq!(settings.scheduler.failure_policy, FailurePolicy::Isolate);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.ttl_secs, 3600);
        assert_eq!(settings.cache.max_size, 1000);
        assert_eq!(settings.retry.max_attempts, 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"cache": {"ttl_secs": 60}, "scheduler": {"failure_policy": "abort"}}"#)
                .unwrap();
        assert_eq!(settings.cache.ttl_secs, 60);
        assert_eq!(settings.cache.max_size, 1000);
        assert_eq!(settings.scheduler.failure_policy, FailurePolicy::Abort);
        assert_eq!(settings.scheduler.concurrency, 5);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: std::result::Result<Settings, _> =
            serde_json::from_str(r#"{"cache": {"ttl": 60}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.scheduler.concurrency = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.cache.max_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.cache.ttl_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.retry.backoff_base = 0.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.retry.installer = Some(Vec::new());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_retry_conversion() {
        let retry = RetrySettings {
            backoff_unit_ms: 250,
            attempt_timeout_secs: Some(30),
            installer: Some(vec!["pip".into(), "install".into()]),
            ..Default::default()
        };

        let config = retry.retry_config();
        assert_eq!(config.backoff_unit, Duration::from_millis(250));
        assert_eq!(config.attempt_timeout, Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());

        let defaults = retry.default_remediations();
        assert_eq!(defaults.connection_wait, Duration::from_secs(5));
        assert_eq!(defaults.installer.as_deref().map(<[String]>::len), Some(2));
    }
}
