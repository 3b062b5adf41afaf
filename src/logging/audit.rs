//! Audit events
//!
//! Account and content changes are emitted as single-line JSON records on the
//! `wriders::audit` tracing target.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserRegistered,
    LoginSucceeded,
    LoginFailed,
    /// Every session of a user was invalidated
    SessionsRevoked,
    RolesChanged,
    ContentCreated,
    ContentUpdated,
    ContentDeleted,
    ChaptersReordered,
    /// A follow, favorite or read record was added or removed
    ActivityToggled,
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Acting user (if known)
    pub user_id: Option<String>,
    /// Kind of the affected entity, e.g. "book"
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            entity: None,
            entity_id: None,
            metadata: None,
        }
    }

    pub fn with_user(mut self, user_id: ObjectId) -> Self {
        self.user_id = Some(user_id.to_hex());
        self
    }

    /// Set the affected entity
    pub fn with_entity(mut self, entity: &str, id: ObjectId) -> Self {
        self.entity = Some(entity.to_string());
        self.entity_id = Some(id.to_hex());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Emit on the audit target
    pub fn emit(self) {
        match self.to_jsonl() {
            Ok(line) => info!(target: "wriders::audit", "{}", line),
            Err(e) => error!("Failed to serialize audit event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let user = ObjectId::new();
        let book = ObjectId::new();
        let event = AuditEvent::new(EventType::ContentDeleted)
            .with_user(user)
            .with_entity("book", book)
            .with_metadata(serde_json::json!({ "chapters": 3 }));

        let line = event.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event_type"], "content_deleted");
        assert_eq!(parsed["user_id"], user.to_hex());
        assert_eq!(parsed["entity"], "book");
        assert_eq!(parsed["metadata"]["chapters"], 3);
    }

    #[test]
    fn test_metadata_omitted_when_empty() {
        let line = AuditEvent::new(EventType::LoginFailed).to_jsonl().unwrap();
        assert!(!line.contains("metadata"));
        assert!(line.contains("\"user_id\":null"));
    }
}
