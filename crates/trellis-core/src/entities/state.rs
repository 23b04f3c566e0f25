use chrono::{DateTime, Utc};
use serde::Serialize;

use super::LogRecord;

/// The ordered record set held by a bounded log cache.
///
/// Invariants maintained by every transformation in `trellis-cache`:
/// - `logs` is sorted ascending by `timestamp`, ties kept in prior relative order
/// - no two records share an `id`
/// - `last_timestamp` is the highest timestamp ever observed, so it survives
///   eviction and the polling cursor never rewinds
///
/// `version` is a coarse "something changed" counter. It is never used for
/// ordering or de-duplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogState {
    pub logs: Vec<LogRecord>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub version: u64,
}

impl LogState {
    /// The empty state: no records, no cursor, version 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            logs: Vec::new(),
            last_timestamp: None,
            version: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.logs.iter().position(|r| r.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LogRecord> {
        self.logs.iter().find(|r| r.id == id)
    }

    /// Oldest record still held.
    #[must_use]
    pub fn oldest(&self) -> Option<&LogRecord> {
        self.logs.first()
    }

    /// Newest record still held.
    #[must_use]
    pub fn newest(&self) -> Option<&LogRecord> {
        self.logs.last()
    }
}
