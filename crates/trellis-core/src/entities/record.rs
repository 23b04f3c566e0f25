use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::enums::{LogKind, LogLevel};
use crate::errors::CoreError;

/// A single session or task log record.
///
/// `id` is stable for the lifetime of the record and `timestamp` is assigned
/// by the server and never changes. Two records with the same `id` are the
/// same record; the newer copy replaces the older one.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct LogRecord {
    pub id: String,
    #[serde(default)]
    pub kind: LogKind,
    #[serde(default, alias = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, alias = "taskId", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    #[schemars(with = "DateTime<Utc>")]
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Emitting component tag.
    #[serde(default)]
    pub source: String,
    pub message: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Parse a server timestamp. RFC 3339 first; ISO 8601 stamps without an
/// offset are read as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
}

impl LogRecord {
    /// Create a session log record with empty source and metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: LogKind::Session,
            session_id: None,
            task_id: None,
            timestamp,
            level,
            source: String::new(),
            message: message.into(),
            metadata: BTreeMap::new(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.kind = LogKind::Task;
        self.task_id = Some(task_id.into());
        self
    }

    /// Decode one record from an untyped JSON value.
    ///
    /// Used where a batch must survive individual bad entries: the caller
    /// drops the offending record and keeps the rest.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRecord`] if the value does not decode or
    /// carries an empty id.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        let id = value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        let record: Self =
            serde_json::from_value(value).map_err(|e| CoreError::MalformedRecord {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        if record.id.trim().is_empty() {
            return Err(CoreError::MalformedRecord {
                id,
                reason: "empty id".into(),
            });
        }
        Ok(record)
    }
}
