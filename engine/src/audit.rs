//! Audit logging capability.
//!
//! Call sites receive an [`AuditLogger`] instead of reaching for a shared
//! instance, so tests and the CLI can choose where events go.

use crate::{ItemId, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// An administrative action worth recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// What happened, e.g. `create`, `delete`, `vote`, `login`
    pub action: String,
    /// Collection the action touched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Item the action touched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<ItemId>,
    /// Who did it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Milliseconds since epoch
    pub timestamp: Timestamp,
    /// Free-form context
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            action: action.into(),
            collection: None,
            target_id: None,
            actor: None,
            timestamp,
            details: serde_json::Value::Null,
        }
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn target(mut self, target_id: impl Into<ItemId>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Sink for audit events.
pub trait AuditLogger: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// In-memory audit log.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl AuditLogger for MemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder() {
        let event = AuditEvent::new("delete", 1000)
            .collection("candidates")
            .target("cand-1")
            .actor("admin");

        assert_eq!(event.action, "delete");
        assert_eq!(event.collection.as_deref(), Some("candidates"));
        assert_eq!(event.target_id.as_deref(), Some("cand-1"));
        assert_eq!(event.actor.as_deref(), Some("admin"));
    }

    #[test]
    fn serialization_format() {
        let event = AuditEvent::new("vote", 5).target("a");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json, json!({"action": "vote", "targetId": "a", "timestamp": 5}));
    }

    #[test]
    fn memory_log_records() {
        let log = MemoryAuditLog::new();
        log.record(AuditEvent::new("login", 1).actor("u1"));
        assert_eq!(log.events().len(), 1);
    }
}
