//! Classify-remediate-retry wrapper around a single operation.

use super::config::RetryConfig;
use super::escalation::{ConsoleEscalation, EscalationEvent, EscalationSink};
use super::remediation::{DefaultRemediations, RemediationContext, RemediationRegistry};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use taskmill_core::{Error, ErrorKind, Result};
use tokio::time::{sleep, timeout};

/// What happened on one failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// Zero-based attempt index
    pub attempt_index: usize,
    /// Classification of the failure
    pub error_kind: ErrorKind,
    /// Whether a registered remediation ran successfully afterwards
    pub remediation_applied: bool,
}

/// Why the attempt loop gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GiveUp {
    Exhausted,
    NoSafeFix,
    Deadline,
}

/// Runs an operation until it succeeds, remediating classified failures in
/// between, and escalates to an operator once attempts run out
///
/// Cloning is cheap; clones share the same registry and escalation sink.
#[derive(Clone)]
pub struct RetryingExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    config: RetryConfig,
    registry: RemediationRegistry,
    escalation: Arc<dyn EscalationSink>,
}

impl std::fmt::Debug for RetryingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingExecutor")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl RetryingExecutor {
    /// Executor with the default remediations and console escalation
    pub fn new(config: RetryConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RetryingExecutorBuilder {
        RetryingExecutorBuilder::default()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &RemediationRegistry {
        &self.inner.registry
    }

    /// Invoke `operation` until it succeeds or attempts are exhausted
    ///
    /// Attempts run strictly one after another. On exhaustion, when the
    /// configured deadline passes, or after a remediation that escalates, an
    /// escalation event is emitted and [`Error::Escalated`] is returned.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut history = Vec::new();
        let attempts = self.attempt_loop(operation, &mut op, &mut history);

        let outcome = match self.inner.config.deadline {
            Some(deadline) => match timeout(deadline, attempts).await {
                Ok(outcome) => outcome,
                Err(_) => Err((Error::timeout(operation, deadline), GiveUp::Deadline)),
            },
            None => attempts.await,
        };

        outcome.map_err(|(error, reason)| self.escalate(operation, history, error, reason))
    }

    async fn attempt_loop<F, Fut, T>(
        &self,
        operation: &str,
        op: &mut F,
        history: &mut Vec<AttemptRecord>,
    ) -> std::result::Result<T, (Error, GiveUp)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let config = &self.inner.config;
        let max_attempts = config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let result = match config.attempt_timeout {
                Some(limit) => match timeout(limit, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::timeout(operation, limit)),
                },
                None => op().await,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(operation, retries = attempt, "succeeded after retries");
                    } else {
                        tracing::info!(operation, "succeeded");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = error.kind();
            tracing::info!(
                operation,
                attempt = attempt + 1,
                max_attempts,
                kind = %kind,
                error = %error,
                "attempt failed"
            );

            let mut record = AttemptRecord {
                attempt_index: attempt,
                error_kind: kind,
                remediation_applied: false,
            };

            if attempt + 1 >= max_attempts {
                history.push(record);
                return Err((error, GiveUp::Exhausted));
            }

            match self.inner.registry.get(kind) {
                Some(rule) => {
                    let ctx = RemediationContext {
                        operation,
                        attempt_index: attempt,
                        error: &error,
                    };
                    let applied = rule.apply(&ctx).await;
                    if rule.escalates() {
                        record.remediation_applied = applied.is_ok();
                        history.push(record);
                        tracing::warn!(
                            operation,
                            remediation = rule.name(),
                            "no safe automatic fix, stopping retries"
                        );
                        return Err((error, GiveUp::NoSafeFix));
                    }
                    match applied {
                        Ok(()) => {
                            record.remediation_applied = true;
                            let delay = config.backoff_delay(attempt);
                            tracing::warn!(
                                operation,
                                remediation = rule.name(),
                                delay_ms = delay.as_millis() as u64,
                                "applied remediation, backing off"
                            );
                            sleep(delay).await;
                        }
                        Err(fix_error) => {
                            tracing::error!(
                                operation,
                                remediation = rule.name(),
                                error = %fix_error,
                                "remediation unavailable"
                            );
                        }
                    }
                }
                None => {
                    tracing::warn!(operation, kind = %kind, "no remediation registered");
                }
            }

            history.push(record);
            attempt += 1;
        }
    }

    fn escalate(
        &self,
        operation: &str,
        history: Vec<AttemptRecord>,
        error: Error,
        reason: GiveUp,
    ) -> Error {
        let kind = error.kind();
        let attempts = history.len();
        let message = match reason {
            GiveUp::Exhausted => format!("failed after {attempts} attempt(s): {error}"),
            GiveUp::NoSafeFix => {
                format!("no safe automatic fix after {attempts} attempt(s): {error}")
            }
            GiveUp::Deadline => {
                format!("gave up after {attempts} attempt(s) before the deadline: {error}")
            }
        };

        self.inner.escalation.escalate(&EscalationEvent {
            operation: operation.to_string(),
            kind,
            message,
            attempts: history,
            terminal: true,
        });

        Error::escalated(operation, attempts, kind, error)
    }
}

/// Builder for [`RetryingExecutor`]
#[derive(Default)]
pub struct RetryingExecutorBuilder {
    config: Option<RetryConfig>,
    defaults: Option<DefaultRemediations>,
    registry: Option<RemediationRegistry>,
    escalation: Option<Arc<dyn EscalationSink>>,
}

impl RetryingExecutorBuilder {
    pub fn config(mut self, config: RetryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Options for the built-in remediations; ignored with [`Self::registry`]
    pub fn default_remediations(mut self, defaults: DefaultRemediations) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Use this registry instead of the built-in one
    pub fn registry(mut self, registry: RemediationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn escalation(mut self, sink: Arc<dyn EscalationSink>) -> Self {
        self.escalation = Some(sink);
        self
    }

    pub fn build(self) -> Result<RetryingExecutor> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let escalation = self
            .escalation
            .unwrap_or_else(|| Arc::new(ConsoleEscalation));
        let registry = match self.registry {
            Some(registry) => registry,
            None => RemediationRegistry::with_defaults(
                &self.defaults.unwrap_or_default(),
                Arc::clone(&escalation),
            ),
        };

        Ok(RetryingExecutor {
            inner: Arc::new(ExecutorInner {
                config,
                registry,
                escalation,
            }),
        })
    }
}
