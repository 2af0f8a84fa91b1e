//! Error types for cache storage

use std::path::PathBuf;
use thiserror::Error;

/// Result type for cache storage operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Failures of the snapshot layer
///
/// The cache's lookup and mutation API never returns these; they are logged
/// and the cache carries on. Only explicit helpers such as
/// [`crate::CacheStore::load`] and [`crate::ResultCache::flush`] hand them
/// to the caller.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error during {operation} on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize cache snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write snapshot {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("snapshot writer for {} is no longer running", path.display())]
    WriterUnavailable { path: PathBuf },

    #[error("invalid cache configuration: {message}")]
    Configuration { message: String },
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
        }
    }

    /// Whether the failure only means nothing has been cached yet
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<CacheError> for taskmill_core::Error {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Io {
                path,
                operation,
                source,
            } => taskmill_core::Error::file_system(path, operation, source),
            CacheError::Corrupt { path, source } => taskmill_core::Error::malformed_data(format!(
                "cache snapshot {}: {source}",
                path.display()
            )),
            CacheError::Configuration { message } => taskmill_core::Error::configuration(message),
            other => taskmill_core::Error::operation("cache", other.to_string()),
        }
    }
}
