//! Failure classification.
//!
//! Every [`Error`] maps to exactly one [`ErrorKind`]. The mapping is a pure
//! function of the error's structure (variant and, for I/O failures, the
//! underlying [`std::io::ErrorKind`]) and never looks at message text.

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable category of a failure, used to pick a remediation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// A required program or library is not installed
    MissingDependency,
    /// A connection failed in a way that may succeed later
    TransientConnection,
    /// A required file or directory does not exist
    MissingPath,
    /// Input could not be parsed
    MalformedData,
    /// Text was not valid in the expected encoding
    Encoding,
    /// The process lacks the rights to perform the operation
    PermissionDenied,
    /// The operation exceeded its time budget
    Timeout,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::MissingDependency,
        ErrorKind::TransientConnection,
        ErrorKind::MissingPath,
        ErrorKind::MalformedData,
        ErrorKind::Encoding,
        ErrorKind::PermissionDenied,
        ErrorKind::Timeout,
        ErrorKind::Unknown,
    ];

    /// Stable string identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingDependency => "missing-dependency",
            ErrorKind::TransientConnection => "transient-connection",
            ErrorKind::MissingPath => "missing-path",
            ErrorKind::MalformedData => "malformed-data",
            ErrorKind::Encoding => "encoding",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Failures of this kind may go away without any intervention
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, ErrorKind::TransientConnection | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::configuration(format!("unknown error kind '{s}'")))
    }
}

/// Classify an error into its [`ErrorKind`]
#[must_use]
pub fn classify(error: &Error) -> ErrorKind {
    match error {
        Error::MissingDependency { .. } => ErrorKind::MissingDependency,
        Error::MissingPath { .. } => ErrorKind::MissingPath,
        Error::MalformedData { .. } => ErrorKind::MalformedData,
        Error::Encoding { .. } => ErrorKind::Encoding,
        Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
        Error::Timeout { .. } => ErrorKind::Timeout,
        Error::Network { .. } => ErrorKind::TransientConnection,
        Error::FileSystem { source, .. } => classify_io(source.kind()),
        Error::Json { source, .. } => match source.classify() {
            serde_json::error::Category::Io => ErrorKind::Unknown,
            _ => ErrorKind::MalformedData,
        },
        Error::Escalated { kind, .. } => *kind,
        Error::Context { source, .. } => classify(source),
        Error::Configuration { .. }
        | Error::CommandExecution { .. }
        | Error::Operation { .. }
        | Error::Cancelled { .. } => ErrorKind::Unknown,
    }
}

fn classify_io(kind: std::io::ErrorKind) -> ErrorKind {
    use std::io::ErrorKind as Io;
    match kind {
        Io::NotFound => ErrorKind::MissingPath,
        Io::PermissionDenied => ErrorKind::PermissionDenied,
        Io::InvalidData => ErrorKind::MalformedData,
        Io::TimedOut => ErrorKind::Timeout,
        Io::ConnectionRefused
        | Io::ConnectionReset
        | Io::ConnectionAborted
        | Io::NotConnected
        | Io::BrokenPipe
        | Io::AddrNotAvailable => ErrorKind::TransientConnection,
        _ => ErrorKind::Unknown,
    }
}
