use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::enums::PushEventKind;

/// One parsed notification from the push channel.
///
/// Built from the `{ type, entityId, data, timestamp }` envelope; `kind` comes
/// from the SSE event name, or from `type` for generic `message` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushEvent {
    pub kind: PushEventKind,
    pub entity_id: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: Option<DateTime<Utc>>,
}

impl PushEvent {
    #[must_use]
    pub const fn new(kind: PushEventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            entity_id: None,
            data,
            timestamp: None,
        }
    }
}
