// backend/src/events.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Structured record of a mutation performed by the core. The core only
/// builds and logs these; persisting or publishing them is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub op: &'static str,
    pub entity: &'static str,
    pub entity_id: Option<i64>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub actor: i64,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(op: &'static str, entity: &'static str, actor: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            op,
            entity,
            entity_id: None,
            before: None,
            after: None,
            actor,
            at: Utc::now(),
        }
    }

    pub fn entity_id(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn before(mut self, v: serde_json::Value) -> Self {
        self.before = Some(v);
        self
    }

    pub fn after(mut self, v: serde_json::Value) -> Self {
        self.after = Some(v);
        self
    }

    pub fn emit(&self) {
        tracing::info!(
            target: "giga::audit",
            event_id = %self.id,
            op = self.op,
            entity = self.entity,
            entity_id = ?self.entity_id,
            actor = self.actor,
            "audit event"
        );
    }
}
