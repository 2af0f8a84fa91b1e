//! Retry with failure classification, remediation and escalation.
//!
//! ## Architecture
//!
//! - [`config`] - `RetryConfig`: attempt bound, backoff curve, timeouts
//! - [`remediation`] - the `Remediation` strategy trait, built-in fixes and
//!   the `RemediationRegistry` keyed by `ErrorKind`
//! - [`escalation`] - the operator alert channel
//! - [`executor`] - `RetryingExecutor`, the attempt loop itself
//!
//! ## Example
//!
//! ```rust,no_run
//! use taskmill_utils::resilience::{RetryConfig, RetryingExecutor};
//!
//! # async fn example() -> taskmill_core::Result<String> {
//! let executor = RetryingExecutor::new(RetryConfig::default())?;
//! executor
//!     .run("fetch-report", || async { Ok("report".to_string()) })
//!     .await
//! # }
//! ```

pub mod config;
pub mod escalation;
pub mod executor;
pub mod remediation;

pub use config::RetryConfig;
pub use escalation::{
    ConsoleEscalation, EscalationEvent, EscalationSink, RecordingEscalation, ESCALATION_TARGET,
};
pub use executor::{AttemptRecord, RetryingExecutor, RetryingExecutorBuilder};
pub use remediation::{
    remediation_fn, CreateMissingPath, DefaultRemediations, FnRemediation, InstallDependency,
    LogOnly, OperatorAlert, Remediation, RemediationContext, RemediationRegistry,
    WaitBeforeRetry,
};
