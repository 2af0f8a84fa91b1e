/// Constants used throughout the taskmill codebase
// Application name, used for XDG directories
pub const APP_NAME: &str = "taskmill";

// File names
pub const CONFIG_FILENAME: &str = "config.json";
pub const CACHE_FILENAME: &str = "cache.json";

// Environment variable names
pub const TASKMILL_LOG_VAR: &str = "TASKMILL_LOG";
pub const TASKMILL_CONFIG_VAR: &str = "TASKMILL_CONFIG";
pub const TASKMILL_CONCURRENCY_VAR: &str = "TASKMILL_CONCURRENCY";
pub const TASKMILL_FAILURE_POLICY_VAR: &str = "TASKMILL_FAILURE_POLICY";
pub const TASKMILL_CACHE_ENABLED_VAR: &str = "TASKMILL_CACHE_ENABLED";
pub const TASKMILL_CACHE_PATH_VAR: &str = "TASKMILL_CACHE_PATH";
pub const TASKMILL_CACHE_TTL_VAR: &str = "TASKMILL_CACHE_TTL";
pub const TASKMILL_CACHE_MAX_SIZE_VAR: &str = "TASKMILL_CACHE_MAX_SIZE";
pub const TASKMILL_RETRY_MAX_ATTEMPTS_VAR: &str = "TASKMILL_RETRY_MAX_ATTEMPTS";
pub const TASKMILL_BACKOFF_BASE_VAR: &str = "TASKMILL_BACKOFF_BASE";

// Scheduler defaults
pub const DEFAULT_CONCURRENCY: usize = 5;

// Cache defaults
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_CACHE_MAX_SIZE: usize = 1000;
/// Fraction of `max_size` kept after a capacity sweep
pub const CACHE_TRIM_RATIO: f64 = 0.8;

// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;
pub const DEFAULT_CONNECTION_WAIT_SECS: u64 = 5;
