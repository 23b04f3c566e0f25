//! Decoding of fetch-diff bodies and event-stream payloads.
//!
//! Both decoders are lenient at the record level: one bad entry is logged
//! and dropped while the rest of the batch survives.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use trellis_core::entities::{self, LogDiff, LogRecord, PushEvent};
use trellis_core::enums::PushEventKind;

use crate::error::SyncError;
use crate::sse::SseFrame;

#[derive(Debug, Default, Deserialize)]
struct RawDiff {
    #[serde(default)]
    added: Vec<Value>,
    #[serde(default)]
    updated: Vec<Value>,
    #[serde(default, alias = "deletedIds")]
    deleted_ids: Vec<Value>,
    #[serde(default)]
    version: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, alias = "entityId")]
    entity_id: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<Value>,
}

/// Decode a fetch-diff response body.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] if the body is not a JSON object. Individual
/// malformed records and non-string deleted ids are dropped.
pub fn decode_diff(body: &[u8]) -> Result<LogDiff, SyncError> {
    let raw: RawDiff =
        serde_json::from_slice(body).map_err(|e| SyncError::Parse(format!("diff body: {e}")))?;

    Ok(LogDiff {
        added: decode_records(raw.added, "added"),
        updated: decode_records(raw.updated, "updated"),
        deleted_ids: decode_ids(raw.deleted_ids),
        version: raw.version.and_then(scalar_to_string),
    })
}

fn decode_records(values: Vec<Value>, collection: &str) -> Vec<LogRecord> {
    values
        .into_iter()
        .filter_map(|value| match LogRecord::from_value(value) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(%error, collection, "dropping malformed log record");
                None
            }
        })
        .collect()
}

fn decode_ids(values: Vec<Value>) -> BTreeSet<String> {
    values
        .into_iter()
        .filter_map(|value| {
            let id = scalar_to_string(value.clone()).filter(|id| !id.trim().is_empty());
            if id.is_none() {
                tracing::warn!(%value, "dropping invalid deleted id");
            }
            id
        })
        .collect()
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode one event-stream frame into a [`PushEvent`].
///
/// The event name comes from the SSE `event:` field, or from the envelope's
/// `type` for generic `message` frames. Returns `Ok(None)` for names this
/// client does not handle.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] if the frame data is not a JSON object.
pub fn decode_event(frame: &SseFrame) -> Result<Option<PushEvent>, SyncError> {
    let envelope: Envelope = serde_json::from_str(&frame.data)
        .map_err(|e| SyncError::Parse(format!("event payload: {e}")))?;

    let name = frame
        .event
        .as_deref()
        .filter(|name| *name != "message")
        .or(envelope.kind.as_deref());
    let Some(name) = name else {
        tracing::debug!("event without a name, skipping");
        return Ok(None);
    };
    let Some(kind) = PushEventKind::from_name(name) else {
        tracing::debug!(event = name, "unknown event, skipping");
        return Ok(None);
    };

    Ok(Some(PushEvent {
        kind,
        entity_id: envelope.entity_id,
        data: envelope.data,
        timestamp: envelope.timestamp.and_then(parse_timestamp),
    }))
}

fn parse_timestamp(value: Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => entities::parse_timestamp(&s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
