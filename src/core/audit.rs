//! Audit trail of hub decisions.
//!
//! The hub records one event per state transition so operators can replay
//! why a request was served when it was.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::clock::now_ms;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Request entered the pending queue.
    Submit,
    /// Request was bound to a worker slot.
    Assign,
    /// Session ended and released its slot.
    Terminate,
    /// Pending request removed by queue clear.
    Discard,
    /// Pending request removed by its submitter.
    Cancel,
    /// Pending request removed by the admission timeout.
    Timeout,
    /// Submission refused because nothing could ever match it.
    Reject,
    /// Priority policy replaced.
    Policy,
    /// Worker joined.
    Register,
    /// Worker left.
    Unregister,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submit => "submit",
            Self::Assign => "assign",
            Self::Terminate => "terminate",
            Self::Discard => "discard",
            Self::Cancel => "cancel",
            Self::Timeout => "timeout",
            Self::Reject => "reject",
            Self::Policy => "policy",
            Self::Register => "register",
            Self::Unregister => "unregister",
        };
        f.write_str(s)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Subject of the event: a request, session, or worker id.
    pub subject: String,
    /// Worker involved, if any.
    pub worker: Option<String>,
    /// Action taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// Bounded in-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink keeping at most `max_events`.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that forwards every event to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::debug!(
            target: "grid_hub::audit",
            event_id = %event.event_id,
            subject = %event.subject,
            worker = event.worker.as_deref().unwrap_or("-"),
            action = %event.action,
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    event_id: impl Into<String>,
    subject: impl Into<String>,
    worker: Option<String>,
    action: AuditAction,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: event_id.into(),
        subject: subject.into(),
        worker,
        action,
        created_at_ms: now_ms(),
        detail,
    }
}
