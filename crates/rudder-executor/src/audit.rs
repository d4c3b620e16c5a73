//! Audit trail.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome recorded on an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOutcome {
    Ok,
    Fail,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub result: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, result: AuditOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            result,
            actor: None,
            target: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn ok(action: impl Into<String>) -> Self {
        Self::new(action, AuditOutcome::Ok)
    }

    pub fn fail(action: impl Into<String>) -> Self {
        Self::new(action, AuditOutcome::Fail)
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Destination for audit events.
///
/// `record` must not block on I/O; sinks that persist should hand the
/// event off to a writer task.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events to the `rudder::audit` tracing target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let actor = event.actor.as_deref().unwrap_or("-");
        let target = event.target.as_deref().unwrap_or("-");
        match event.result {
            AuditOutcome::Ok => info!(
                target: "rudder::audit",
                action = %event.action,
                result = event.result.as_str(),
                actor,
                subject = target,
                metadata = %event.metadata,
                "audit"
            ),
            AuditOutcome::Fail => warn!(
                target: "rudder::audit",
                action = %event.action,
                result = event.result.as_str(),
                actor,
                subject = target,
                metadata = %event.metadata,
                "audit"
            ),
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Events whose action equals `action`.
    pub fn by_action(&self, action: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
