//! Cache configuration

use crate::errors::{CacheError, Result};
use std::path::PathBuf;
use std::time::Duration;
use taskmill_config::CacheSettings;
use taskmill_core::{DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL_SECS};
use taskmill_utils::XdgPaths;

/// Configuration for a [`crate::ResultCache`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Snapshot file owned by the cache
    pub path: PathBuf,
    /// Entries at least this old are expired
    pub ttl: Duration,
    /// Entry count that triggers a capacity trim
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        // Use XDG cache directory which respects XDG_CACHE_HOME
        Self {
            path: XdgPaths::cache_file(),
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_size: DEFAULT_CACHE_MAX_SIZE,
        }
    }
}

impl CacheConfig {
    /// Default limits with the snapshot at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            path: settings.resolved_path(),
            ttl: settings.ttl(),
            max_size: settings.max_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::configuration("ttl must be non-zero"));
        }
        if self.max_size == 0 {
            return Err(CacheError::configuration("max_size must be at least 1"));
        }
        if self.path.as_os_str().is_empty() {
            return Err(CacheError::configuration("snapshot path is empty"));
        }
        Ok(())
    }
}
