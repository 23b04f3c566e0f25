//! Severity levels, record kinds, cache scopes and push-event names.
//!
//! Enums use `snake_case` serialization unless the wire format dictates
//! otherwise (push-event names are `kebab-case`, matching the SSE `event:`
//! field emitted by the server).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

/// Severity of a log record. Ordered from least to most severe.
///
/// Deserialization goes through [`FromStr`], so the wire accepts the same
/// spellings as the CLI (`INFO`, `warning`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(CoreError::Validation(format!("unknown log level '{other}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// LogKind
// ---------------------------------------------------------------------------

/// Which log category a record belongs to.
///
/// Session logs and task logs live in disjoint id spaces on the server
/// (`slog-` / `tlog-` prefixes) and are merged into one ordered view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    #[default]
    Session,
    Task,
}

impl LogKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogScope
// ---------------------------------------------------------------------------

/// The logical view a cache is bound to. Every scope owns its own cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogScope {
    /// All sessions.
    Global,
    /// A single session, by id.
    Session(String),
}

impl LogScope {
    #[must_use]
    pub const fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// The session id, if this is a single-session scope.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Session(id) => Some(id),
        }
    }
}

impl fmt::Display for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Session(id) => write!(f, "session:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// PushEventKind
// ---------------------------------------------------------------------------

/// Named events recognized on the push channel.
///
/// ```text
/// session-{update,created,deleted}  → observers only
/// task-{update,created,deleted}     → observers only
/// log-created                       → cache upsert + observers
/// system-update                     → observers only
/// diff-available                    → early poll + observers
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PushEventKind {
    SessionUpdate,
    SessionCreated,
    SessionDeleted,
    TaskUpdate,
    TaskCreated,
    TaskDeleted,
    LogCreated,
    SystemUpdate,
    DiffAvailable,
}

impl PushEventKind {
    pub const ALL: [Self; 9] = [
        Self::SessionUpdate,
        Self::SessionCreated,
        Self::SessionDeleted,
        Self::TaskUpdate,
        Self::TaskCreated,
        Self::TaskDeleted,
        Self::LogCreated,
        Self::SystemUpdate,
        Self::DiffAvailable,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionUpdate => "session-update",
            Self::SessionCreated => "session-created",
            Self::SessionDeleted => "session-deleted",
            Self::TaskUpdate => "task-update",
            Self::TaskCreated => "task-created",
            Self::TaskDeleted => "task-deleted",
            Self::LogCreated => "log-created",
            Self::SystemUpdate => "system-update",
            Self::DiffAvailable => "diff-available",
        }
    }

    /// Resolve an event name. Accepts both `kebab-case` and `snake_case`
    /// spellings since envelopes carry the latter in their `type` field.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().replace('_', "-").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
