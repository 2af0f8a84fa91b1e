//! Remediation strategies applied between retry attempts.
//!
//! A [`RemediationRegistry`] maps an [`ErrorKind`] to one [`Remediation`].
//! The registry is assembled up front and handed to a `RetryingExecutor`,
//! which never mutates it afterwards.

use super::escalation::{EscalationEvent, EscalationSink};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskmill_core::{Error, ErrorKind, Result, DEFAULT_CONNECTION_WAIT_SECS};

/// What a remediation gets to look at
#[derive(Debug)]
pub struct RemediationContext<'a> {
    /// Name of the operation being retried
    pub operation: &'a str,
    /// Zero-based index of the attempt that just failed
    pub attempt_index: usize,
    /// The failure itself
    pub error: &'a Error,
}

/// Corrective action applied before the next attempt
///
/// Returning an error means "no fix was possible"; the retry loop logs it and
/// moves on to the next attempt without waiting.
#[async_trait]
pub trait Remediation: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Whether the retry loop stops and escalates once this rule has run
    fn escalates(&self) -> bool {
        false
    }

    async fn apply(&self, ctx: &RemediationContext<'_>) -> Result<()>;
}

/// Typed mapping from error kind to remediation
#[derive(Clone, Default)]
pub struct RemediationRegistry {
    rules: HashMap<ErrorKind, Arc<dyn Remediation>>,
}

impl fmt::Debug for RemediationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules: Vec<_> = self
            .rules
            .iter()
            .map(|(kind, rule)| (*kind, rule.name().to_string()))
            .collect();
        rules.sort();
        f.debug_struct("RemediationRegistry")
            .field("rules", &rules)
            .finish()
    }
}

impl RemediationRegistry {
    /// Registry with no rules; every failure is retried without a fix
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rules
    pub fn with_defaults(
        options: &DefaultRemediations,
        escalation: Arc<dyn EscalationSink>,
    ) -> Self {
        let mut registry = Self::new()
            .register(ErrorKind::MissingPath, CreateMissingPath)
            .register(
                ErrorKind::TransientConnection,
                WaitBeforeRetry::new(options.connection_wait),
            )
            .register(ErrorKind::Timeout, LogOnly::new("backoff"))
            .register(ErrorKind::MalformedData, LogOnly::new("log-malformed-data"))
            .register(ErrorKind::Encoding, LogOnly::new("log-encoding"))
            .register(ErrorKind::PermissionDenied, OperatorAlert::new(escalation));

        if let Some((program, args)) = options.installer.as_ref().and_then(|cmd| cmd.split_first()) {
            registry = registry.register(
                ErrorKind::MissingDependency,
                InstallDependency::new(program.clone(), args.to_vec()),
            );
        }
        registry
    }

    /// Add or replace the rule for `kind`
    ///
    /// `ErrorKind::Unknown` cannot carry a rule; unknown failures are always
    /// retried without remediation.
    #[must_use]
    pub fn register(mut self, kind: ErrorKind, rule: impl Remediation + 'static) -> Self {
        if kind == ErrorKind::Unknown {
            tracing::warn!(
                remediation = rule.name(),
                "ignoring remediation registered for unknown error kind"
            );
            return self;
        }
        self.rules.insert(kind, Arc::new(rule));
        self
    }

    pub fn get(&self, kind: ErrorKind) -> Option<&Arc<dyn Remediation>> {
        self.rules.get(&kind)
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.rules.contains_key(&kind)
    }

    /// Kinds that have a rule, in stable order
    pub fn kinds(&self) -> Vec<ErrorKind> {
        let mut kinds: Vec<_> = self.rules.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Options for [`RemediationRegistry::with_defaults`]
#[derive(Debug, Clone)]
pub struct DefaultRemediations {
    /// Pause applied to transient connection failures
    pub connection_wait: Duration,
    /// Installer command; the missing dependency name is appended
    pub installer: Option<Vec<String>>,
}

impl Default for DefaultRemediations {
    fn default() -> Self {
        Self {
            connection_wait: Duration::from_secs(DEFAULT_CONNECTION_WAIT_SECS),
            installer: None,
        }
    }
}

/// Creates the directory a failed operation expected to exist
///
/// Paths with an extension are treated as files and get their parent created.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreateMissingPath;

#[async_trait]
impl Remediation for CreateMissingPath {
    fn name(&self) -> &str {
        "create-missing-path"
    }

    async fn apply(&self, ctx: &RemediationContext<'_>) -> Result<()> {
        let path = missing_path(ctx.error).ok_or_else(|| {
            Error::operation(ctx.operation, "could not determine which path is missing")
        })?;

        let dir = if path.extension().is_some() {
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => return Ok(()),
            }
        } else {
            path
        };

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::file_system(&dir, "create missing directory", e))?;
        tracing::warn!(operation = ctx.operation, path = %dir.display(), "created directory");
        Ok(())
    }
}

fn missing_path(error: &Error) -> Option<PathBuf> {
    match error {
        Error::MissingPath { path } => Some(path.clone()),
        Error::FileSystem { path, source, .. }
            if source.kind() == std::io::ErrorKind::NotFound && !path.as_os_str().is_empty() =>
        {
            Some(path.clone())
        }
        Error::Context { source, .. } => missing_path(source),
        _ => None,
    }
}

/// Sleeps before letting the next attempt go ahead
#[derive(Debug, Clone, Copy)]
pub struct WaitBeforeRetry {
    delay: Duration,
}

impl WaitBeforeRetry {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Remediation for WaitBeforeRetry {
    fn name(&self) -> &str {
        "wait-before-retry"
    }

    async fn apply(&self, ctx: &RemediationContext<'_>) -> Result<()> {
        tracing::warn!(
            operation = ctx.operation,
            delay_ms = self.delay.as_millis() as u64,
            "waiting for connection to recover"
        );
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Runs an installer for the dependency named in the error
#[derive(Debug, Clone)]
pub struct InstallDependency {
    program: String,
    args: Vec<String>,
}

impl InstallDependency {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Remediation for InstallDependency {
    fn name(&self) -> &str {
        "install-dependency"
    }

    async fn apply(&self, ctx: &RemediationContext<'_>) -> Result<()> {
        let dependency = dependency_name(ctx.error).ok_or_else(|| {
            Error::operation(ctx.operation, "could not determine which dependency is missing")
        })?;

        tracing::warn!(
            operation = ctx.operation,
            dependency = %dependency,
            installer = %self.program,
            "installing missing dependency"
        );

        let mut args = self.args.clone();
        args.push(dependency.to_string());
        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                Error::command_execution(&self.program, args.clone(), e.to_string(), None)
            })?;

        if !output.status.success() {
            return Err(Error::command_execution(
                &self.program,
                args,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
                output.status.code(),
            ));
        }
        tracing::info!(dependency = %dependency, "dependency installed");
        Ok(())
    }
}

fn dependency_name(error: &Error) -> Option<&str> {
    match error {
        Error::MissingDependency { name, .. } => Some(name),
        Error::Context { source, .. } => dependency_name(source),
        _ => None,
    }
}

/// Records the failure and lets backoff do the rest
#[derive(Debug, Clone, Copy)]
pub struct LogOnly {
    label: &'static str,
}

impl LogOnly {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

#[async_trait]
impl Remediation for LogOnly {
    fn name(&self) -> &str {
        self.label
    }

    async fn apply(&self, ctx: &RemediationContext<'_>) -> Result<()> {
        tracing::warn!(
            operation = ctx.operation,
            kind = %ctx.error.kind(),
            error = %ctx.error,
            "no automatic fix available, backing off"
        );
        Ok(())
    }
}

/// Alerts an operator and ends the retry loop; retrying cannot fix the cause
pub struct OperatorAlert {
    sink: Arc<dyn EscalationSink>,
}

impl OperatorAlert {
    pub fn new(sink: Arc<dyn EscalationSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Remediation for OperatorAlert {
    fn name(&self) -> &str {
        "operator-alert"
    }

    fn escalates(&self) -> bool {
        true
    }

    async fn apply(&self, ctx: &RemediationContext<'_>) -> Result<()> {
        let kind = ctx.error.kind();
        self.sink.escalate(&EscalationEvent {
            operation: ctx.operation.to_string(),
            kind,
            message: format!("{kind} requires manual intervention: {}", ctx.error),
            attempts: Vec::new(),
            terminal: false,
        });
        Ok(())
    }
}

/// Remediation backed by a synchronous closure
pub struct FnRemediation<F> {
    name: String,
    action: F,
}

/// Wrap a closure as a [`Remediation`]
pub fn remediation_fn<F>(name: impl Into<String>, action: F) -> FnRemediation<F>
where
    F: Fn(&RemediationContext<'_>) -> Result<()> + Send + Sync,
{
    FnRemediation {
        name: name.into(),
        action,
    }
}

#[async_trait]
impl<F> Remediation for FnRemediation<F>
where
    F: Fn(&RemediationContext<'_>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, ctx: &RemediationContext<'_>) -> Result<()> {
        (self.action)(ctx)
    }
}
