use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::LogRecord;
use crate::enums::LogLevel;

/// A batch of changes returned by one fetch-diff call. Applied once, then
/// discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDiff {
    #[serde(default)]
    pub added: Vec<LogRecord>,
    #[serde(default)]
    pub updated: Vec<LogRecord>,
    #[serde(default, alias = "deletedIds")]
    pub deleted_ids: BTreeSet<String>,
    /// Server-side version stamp, kept for diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl LogDiff {
    /// True iff any of `added`, `updated` or `deleted_ids` is non-empty.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.deleted_ids.is_empty()
    }

    /// Per-collection entry counts.
    #[must_use]
    pub fn size(&self) -> DiffSize {
        DiffSize {
            added_count: self.added.len(),
            updated_count: self.updated.len(),
            deleted_count: self.deleted_ids.len(),
        }
    }
}

/// Entry counts of a [`LogDiff`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSize {
    pub added_count: usize,
    pub updated_count: usize,
    pub deleted_count: usize,
}

impl DiffSize {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.added_count + self.updated_count + self.deleted_count
    }
}

/// Caller-supplied narrowing applied on top of the cache cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub level: Option<LogLevel>,
    pub source: Option<String>,
    pub limit: Option<u32>,
}

/// The cursor for one fetch-diff call: "what changed since here".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffQuery {
    /// Exclusive lower bound. `None` asks for everything the server retains.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub level: Option<LogLevel>,
    pub source: Option<String>,
}

impl DiffQuery {
    /// Query-string pairs in a stable order, absent fields omitted.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(since) = self.since {
            pairs.push(("since", since.to_rfc3339_opts(SecondsFormat::AutoSi, true)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(level) = self.level {
            pairs.push(("level", level.as_str().to_string()));
        }
        if let Some(source) = &self.source {
            pairs.push(("source", source.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_diff_has_no_changes() {
        assert!(!LogDiff::default().has_changes());
    }

    #[test]
    fn deleted_ids_alone_count_as_changes() {
        let diff = LogDiff {
            deleted_ids: BTreeSet::from(["slog-1".to_string()]),
            ..LogDiff::default()
        };
        assert!(diff.has_changes());
        assert_eq!(diff.size().total(), 1);
    }

    #[test]
    fn decodes_camel_case_deleted_ids() {
        let diff: LogDiff =
            serde_json::from_str(r#"{"deletedIds":["a","b"],"version":"v9"}"#).unwrap();
        assert_eq!(diff.deleted_ids.len(), 2);
        assert_eq!(diff.version.as_deref(), Some("v9"));
        assert!(diff.added.is_empty());
    }

    #[test]
    fn query_pairs_omit_absent_fields() {
        assert!(DiffQuery::default().to_query_pairs().is_empty());

        let query = DiffQuery {
            since: Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()),
            limit: Some(50),
            level: Some(LogLevel::Error),
            source: Some("runner".into()),
        };
        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("since", "2026-03-01T10:00:00Z".to_string()),
                ("limit", "50".to_string()),
                ("level", "error".to_string()),
                ("source", "runner".to_string()),
            ]
        );
    }
}
