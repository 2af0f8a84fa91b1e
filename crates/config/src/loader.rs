//! Layered configuration loading
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! `TASKMILL_*` environment variables, then explicit [`CliOverrides`].

use crate::settings::Settings;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use taskmill_core::{
    Error, FailurePolicy, Result, TASKMILL_BACKOFF_BASE_VAR, TASKMILL_CACHE_ENABLED_VAR,
    TASKMILL_CACHE_MAX_SIZE_VAR, TASKMILL_CACHE_PATH_VAR, TASKMILL_CACHE_TTL_VAR,
    TASKMILL_CONCURRENCY_VAR, TASKMILL_CONFIG_VAR, TASKMILL_FAILURE_POLICY_VAR,
    TASKMILL_RETRY_MAX_ATTEMPTS_VAR,
};
use taskmill_utils::XdgPaths;

/// Where the effective value of a setting came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    File(PathBuf),
    Environment(&'static str),
    CommandLine,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => f.write_str("default"),
            ConfigSource::File(path) => write!(f, "file {}", path.display()),
            ConfigSource::Environment(var) => write!(f, "env {var}"),
            ConfigSource::CommandLine => f.write_str("command line"),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub concurrency: Option<usize>,
    pub failure_policy: Option<FailurePolicy>,
    pub cache_enabled: Option<bool>,
    pub cache_path: Option<PathBuf>,
}

/// Effective settings plus provenance
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    /// Config file that was read, if any
    pub file: Option<PathBuf>,
    /// Source of every setting keyed by its dotted name, e.g. `cache.ttl_secs`
    pub sources: IndexMap<String, ConfigSource>,
}

impl LoadedSettings {
    pub fn source_of(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }
}

/// Configuration loader that handles all startup configuration
#[derive(Debug)]
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    overrides: CliOverrides,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_file: None,
            overrides: CliOverrides::default(),
            use_env: true,
        }
    }

    /// Read this file instead of the XDG default; it must exist
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn overrides(mut self, overrides: CliOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Skip `TASKMILL_*` environment variables
    pub fn ignore_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load the configuration
    pub fn load(self) -> Result<LoadedSettings> {
        let mut sources = default_sources()?;

        let (path, required) = self.resolve_file();
        let (mut settings, file) = match read_file(&path, required)? {
            Some(raw) => {
                mark_file_sources(&raw, &path, &mut sources);
                let settings: Settings = serde_json::from_value(raw).map_err(|e| {
                    Error::configuration(format!("invalid config file {}: {e}", path.display()))
                })?;
                tracing::debug!(path = %path.display(), "loaded config file");
                (settings, Some(path))
            }
            None => (Settings::default(), None),
        };

        if self.use_env {
            apply_env(&mut settings, &mut sources)?;
        }
        apply_overrides(&mut settings, &self.overrides, &mut sources);

        settings.validate()?;

        Ok(LoadedSettings {
            settings,
            file,
            sources,
        })
    }

    /// The file to read and whether its absence is an error
    fn resolve_file(&self) -> (PathBuf, bool) {
        if let Some(path) = &self.config_file {
            return (path.clone(), true);
        }
        if self.use_env {
            if let Some(path) = std::env::var_os(TASKMILL_CONFIG_VAR).filter(|v| !v.is_empty()) {
                return (PathBuf::from(path), true);
            }
        }
        (XdgPaths::config_file(), false)
    }
}

fn default_sources() -> Result<IndexMap<String, ConfigSource>> {
    let defaults = serde_json::to_value(Settings::default())?;
    let mut sources = IndexMap::new();
    if let Value::Object(sections) = defaults {
        for (section, fields) in sections {
            if let Value::Object(fields) = fields {
                for key in fields.keys() {
                    sources.insert(format!("{section}.{key}"), ConfigSource::Default);
                }
            }
        }
    }
    Ok(sources)
}

fn read_file(path: &Path, required: bool) -> Result<Option<Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(None);
        }
        Err(e) => return Err(Error::file_system(path, "read config file", e)),
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        Error::configuration(format!("malformed config file {}: {e}", path.display()))
    })
}

fn mark_file_sources(raw: &Value, path: &Path, sources: &mut IndexMap<String, ConfigSource>) {
    let Value::Object(sections) = raw else {
        return;
    };
    for (section, fields) in sections {
        if let Value::Object(fields) = fields {
            for key in fields.keys() {
                sources.insert(
                    format!("{section}.{key}"),
                    ConfigSource::File(path.to_path_buf()),
                );
            }
        }
    }
}

fn env_value<T>(var: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::configuration(format!("invalid value '{raw}' for {var}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(var: &'static str) -> Result<Option<bool>> {
    let Some(raw) = env_value::<String>(var)? else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::configuration(format!(
            "invalid value '{raw}' for {var}: expected true or false"
        ))),
    }
}

fn apply_env(settings: &mut Settings, sources: &mut IndexMap<String, ConfigSource>) -> Result<()> {
    let mut mark = |key: &str, var: &'static str| {
        sources.insert(key.to_string(), ConfigSource::Environment(var));
    };

    if let Some(value) = env_value(TASKMILL_CONCURRENCY_VAR)? {
        settings.scheduler.concurrency = value;
        mark("scheduler.concurrency", TASKMILL_CONCURRENCY_VAR);
    }
    if let Some(value) = env_value(TASKMILL_FAILURE_POLICY_VAR)? {
        settings.scheduler.failure_policy = value;
        mark("scheduler.failure_policy", TASKMILL_FAILURE_POLICY_VAR);
    }
    if let Some(value) = env_bool(TASKMILL_CACHE_ENABLED_VAR)? {
        settings.cache.enabled = value;
        mark("cache.enabled", TASKMILL_CACHE_ENABLED_VAR);
    }
    if let Some(value) = env_value::<PathBuf>(TASKMILL_CACHE_PATH_VAR)? {
        settings.cache.path = Some(value);
        mark("cache.path", TASKMILL_CACHE_PATH_VAR);
    }
    if let Some(value) = env_value(TASKMILL_CACHE_TTL_VAR)? {
        settings.cache.ttl_secs = value;
        mark("cache.ttl_secs", TASKMILL_CACHE_TTL_VAR);
    }
    if let Some(value) = env_value(TASKMILL_CACHE_MAX_SIZE_VAR)? {
        settings.cache.max_size = value;
        mark("cache.max_size", TASKMILL_CACHE_MAX_SIZE_VAR);
    }
    if let Some(value) = env_value(TASKMILL_RETRY_MAX_ATTEMPTS_VAR)? {
        settings.retry.max_attempts = value;
        mark("retry.max_attempts", TASKMILL_RETRY_MAX_ATTEMPTS_VAR);
    }
    if let Some(value) = env_value(TASKMILL_BACKOFF_BASE_VAR)? {
        settings.retry.backoff_base = value;
        mark("retry.backoff_base", TASKMILL_BACKOFF_BASE_VAR);
    }
    Ok(())
}

fn apply_overrides(
    settings: &mut Settings,
    overrides: &CliOverrides,
    sources: &mut IndexMap<String, ConfigSource>,
) {
    let mut mark = |key: &str| {
        sources.insert(key.to_string(), ConfigSource::CommandLine);
    };

    if let Some(concurrency) = overrides.concurrency {
        settings.scheduler.concurrency = concurrency;
        mark("scheduler.concurrency");
    }
    if let Some(policy) = overrides.failure_policy {
        settings.scheduler.failure_policy = policy;
        mark("scheduler.failure_policy");
    }
    if let Some(enabled) = overrides.cache_enabled {
        settings.cache.enabled = enabled;
        mark("cache.enabled");
    }
    if let Some(path) = &overrides.cache_path {
        settings.cache.path = Some(path.clone());
        mark("cache.path");
    }
}
