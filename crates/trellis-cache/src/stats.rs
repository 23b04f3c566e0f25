use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_logs: usize,
    pub version: u64,
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Wall-clock time of the last successful mutation.
    pub last_updated: Option<DateTime<Utc>>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of id lookups that found a record; `0.0` before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
