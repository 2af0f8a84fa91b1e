use crate::kind::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for taskmill operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for taskmill operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Network-related errors
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Permission denied errors
    #[error("permission denied for {operation}: {message}")]
    PermissionDenied { operation: String, message: String },

    /// A program or library the operation needs is not installed
    #[error("missing dependency '{name}': {message}")]
    MissingDependency { name: String, message: String },

    /// A file or directory the operation needs does not exist
    #[error("path '{path}' does not exist")]
    MissingPath { path: PathBuf },

    /// Input data could not be parsed
    #[error("malformed data: {message}")]
    MalformedData { message: String },

    /// Text was not valid in the expected encoding
    #[error("encoding error: {message}")]
    Encoding { message: String },

    /// Command execution errors
    #[error("{}", format_command_error(.command, .args, .message, .exit_code))]
    CommandExecution {
        command: String,
        args: Vec<String>,
        message: String,
        exit_code: Option<i32>,
    },

    /// Failure raised by a caller-supplied operation
    #[error("operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },

    /// A unit was cancelled before it could complete
    #[error("operation '{operation}' was cancelled: {reason}")]
    Cancelled { operation: String, reason: String },

    /// Automatic recovery gave up and an operator has been alerted
    #[error("operation '{operation}' escalated after {attempts} attempt(s) ({kind}): {source}")]
    Escalated {
        operation: String,
        attempts: usize,
        kind: ErrorKind,
        #[source]
        source: Box<Error>,
    },

    /// Another error with added context
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

fn format_command_error(
    command: &str,
    args: &[String],
    message: &str,
    exit_code: &Option<i32>,
) -> String {
    let args_str = args.join(" ");
    let invocation = if args_str.is_empty() {
        command.to_string()
    } else {
        format!("{command} {args_str}")
    };
    match exit_code {
        Some(code) => format!("command '{invocation}' failed with exit code {code}: {message}"),
        None => format!("command '{invocation}' failed: {message}"),
    }
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::Operation {
            operation: "anonymous".to_string(),
            message: format!("{error:#}"),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a permission denied error
    #[must_use]
    pub fn permission_denied(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PermissionDenied {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a missing dependency error
    #[must_use]
    pub fn missing_dependency(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MissingDependency {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a missing path error
    #[must_use]
    pub fn missing_path(path: impl Into<PathBuf>) -> Self {
        Error::MissingPath { path: path.into() }
    }

    /// Create a malformed data error
    #[must_use]
    pub fn malformed_data(message: impl Into<String>) -> Self {
        Error::MalformedData {
            message: message.into(),
        }
    }

    /// Create an encoding error
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Error::Encoding {
            message: message.into(),
        }
    }

    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        args: Vec<String>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            args,
            message: message.into(),
            exit_code,
        }
    }

    /// Create an operation failure
    #[must_use]
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Cancelled {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a final failure as an escalation
    #[must_use]
    pub fn escalated(
        operation: impl Into<String>,
        attempts: usize,
        kind: ErrorKind,
        source: Error,
    ) -> Self {
        Error::Escalated {
            operation: operation.into(),
            attempts,
            kind,
            source: Box::new(source),
        }
    }

    /// Classify this error into a stable [`ErrorKind`]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        crate::kind::classify(self)
    }

    /// Whether this error is the terminal result of an escalation
    #[must_use]
    pub fn is_escalation(&self) -> bool {
        match self {
            Error::Escalated { .. } => true,
            Error::Context { source, .. } => source.is_escalation(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: message.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::Context {
            message: f(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = Error::command_execution("make", vec!["all".into()], "boom", Some(2));
        assert_eq!(
            err.to_string(),
            "command 'make all' failed with exit code 2: boom"
        );

        let err = Error::command_execution("ls", vec![], "killed", None);
        assert_eq!(err.to_string(), "command 'ls' failed: killed");
    }

    #[test]
    fn test_context_preserves_kind() {
        let result: std::result::Result<(), Error> = Err(Error::missing_path("/tmp/nowhere"));
        let err = result.context("loading input").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingPath);
        assert!(err.to_string().starts_with("loading input: "));
    }

    #[test]
    fn test_escalation_detection() {
        let inner = Error::malformed_data("bad json");
        let err = Error::escalated("parse", 3, ErrorKind::MalformedData, inner);
        assert!(err.is_escalation());
        assert!(!Error::configuration("x").is_escalation());
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: Error = anyhow::anyhow!("nope").into();
        assert!(matches!(err, Error::Operation { .. }));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}
