//! Audit trail
//!
//! Every orchestration operation emits a structured audit event on both
//! its success and failure paths. Events are fire-and-forget: they go
//! through tracing and never affect the outcome of the operation that
//! emitted them. Configuration gates emission with an enabled flag and
//! an allow-list of event kinds.

use crate::config::AuditConfig;
use serde_json::Value;

/// Kinds of audit events, matching the configured allow-list names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    Creation,
    Comment,
    StatusChange,
    Closure,
    Error,
}

impl AuditEvent {
    /// Wire/allow-list name of the event kind
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Creation => "creation",
            AuditEvent::Comment => "comment",
            AuditEvent::StatusChange => "statusChange",
            AuditEvent::Closure => "closure",
            AuditEvent::Error => "error",
        }
    }
}

/// Configuration-gated audit event sink
#[derive(Debug, Clone)]
pub struct AuditLog {
    config: AuditConfig,
}

impl AuditLog {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    /// Whether an event kind would be recorded
    pub fn records(&self, event: AuditEvent) -> bool {
        self.config.enabled && self.config.log_events.iter().any(|e| e == event.as_str())
    }

    /// Record an audit event with a JSON payload
    pub fn log(&self, event: AuditEvent, payload: Value) {
        if !self.records(event) {
            return;
        }

        tracing::info!(
            target: "casebridge::audit",
            event = event.as_str(),
            level = %self.config.log_level,
            payload = %payload,
            "audit"
        );
    }
}
