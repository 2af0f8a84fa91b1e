//! Operator-facing escalation channel.
//!
//! Escalations are not routine log lines. The default sink writes a banner to
//! stderr in addition to an `error` level event under the
//! `taskmill::escalation` target so log pipelines can route them separately.

use super::executor::AttemptRecord;
use parking_lot::Mutex;
use std::io::Write;
use taskmill_core::ErrorKind;

/// Target used for escalation events
pub const ESCALATION_TARGET: &str = "taskmill::escalation";

const BANNER_WIDTH: usize = 60;

/// A request for a human decision
#[derive(Debug, Clone)]
pub struct EscalationEvent {
    /// Operation that could not be completed automatically
    pub operation: String,
    /// Kind of the failure that triggered the escalation
    pub kind: ErrorKind,
    /// Human readable description
    pub message: String,
    /// Attempts made so far, oldest first
    pub attempts: Vec<AttemptRecord>,
    /// Whether the operation has been given up on
    pub terminal: bool,
}

/// Destination for escalation events
pub trait EscalationSink: Send + Sync {
    fn escalate(&self, event: &EscalationEvent);
}

/// Default sink: `error` level tracing event plus a stderr banner
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleEscalation;

impl EscalationSink for ConsoleEscalation {
    fn escalate(&self, event: &EscalationEvent) {
        tracing::error!(
            target: ESCALATION_TARGET,
            escalation = true,
            operation = %event.operation,
            kind = %event.kind,
            attempts = event.attempts.len(),
            terminal = event.terminal,
            "HUMAN INTERVENTION REQUIRED: {}",
            event.message
        );

        let rule = "=".repeat(BANNER_WIDTH);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "\n{rule}\n!! HUMAN INTERVENTION REQUIRED !!\n{rule}\noperation: {}\nkind:      {}\n{}\n{rule}\n",
            event.operation, event.kind, event.message
        );
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingEscalation {
    events: Mutex<Vec<EscalationEvent>>,
}

impl RecordingEscalation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<EscalationEvent> {
        self.events.lock().clone()
    }

    /// Number of terminal escalations received
    pub fn terminal_count(&self) -> usize {
        self.events.lock().iter().filter(|e| e.terminal).count()
    }
}

impl EscalationSink for RecordingEscalation {
    fn escalate(&self, event: &EscalationEvent) {
        self.events.lock().push(event.clone());
    }
}
