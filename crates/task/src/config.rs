use std::time::Duration;
use taskmill_config::SchedulerSettings;
use taskmill_core::{Error, FailurePolicy, Result, DEFAULT_CONCURRENCY};

/// Scheduler limits and failure handling
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Maximum number of units executing at once; cache hits do not count
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Wall-clock budget for a whole batch
    pub timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::Isolate,
            timeout: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            failure_policy: settings.failure_policy,
            timeout: settings.timeout(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::configuration("scheduler concurrency must be at least 1"));
        }
        if matches!(self.timeout, Some(limit) if limit.is_zero()) {
            return Err(Error::configuration("scheduler timeout must be non-zero"));
        }
        Ok(())
    }
}
