//! The bounded log cache.
//!
//! `LogCache` holds an `Arc<LogState>` and swaps it for a freshly computed
//! state on every mutation. Each mutation is computed from the state current
//! at the instant the write lock is taken, never from an earlier snapshot, so
//! push events, poll results and timer-driven optimization can interleave
//! freely. Readers clone the `Arc` and never observe a partially applied
//! change.
//!
//! After [`LogCache::dispose`] every mutation is a no-op. Late poll results
//! and push events that arrive after the owning view is gone are discarded.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use trellis_config::CacheConfig;
use trellis_core::entities::{DiffQuery, LogDiff, LogRecord, LogState, QueryFilters};
use trellis_core::enums::LogLevel;
use trellis_core::observers::{ObserverRegistry, SubscriptionId};

use crate::diff as engine;
use crate::stats::CacheStats;

/// Retention bounds applied by [`LogCache::optimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub retain_period: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            retain_period: config.retain_period(),
        }
    }
}

/// What a successful mutation changed. Delivered to observers after the new
/// state is in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A single record was inserted (`replaced == false`) or replaced.
    Upserted { record: LogRecord, replaced: bool },
    Removed { id: String },
    /// A poll diff was applied. Only entries that actually changed the cache
    /// are listed: duplicates and unknown ids are left out.
    DiffApplied {
        inserted: Vec<LogRecord>,
        updated: Vec<LogRecord>,
        deleted: Vec<String>,
    },
    Cleared,
    Optimized { evicted: usize },
}

struct CacheInner {
    state: Arc<LogState>,
    last_updated: Option<DateTime<Utc>>,
}

pub struct LogCache {
    inner: RwLock<CacheInner>,
    settings: CacheSettings,
    hits: AtomicU64,
    misses: AtomicU64,
    disposed: AtomicBool,
    observers: ObserverRegistry<CacheEvent>,
}

impl Default for LogCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl std::fmt::Debug for LogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("LogCache")
            .field("logs", &state.len())
            .field("version", &state.version)
            .field("settings", &self.settings)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl LogCache {
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                state: Arc::new(LogState::new()),
                last_updated: None,
            }),
            settings,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            observers: ObserverRegistry::new(),
        }
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Apply a poll diff. Returns `false` (and leaves the version alone) when
    /// the diff carries no changes or the cache is disposed.
    pub fn apply_diff(&self, diff: &LogDiff) -> bool {
        if !engine::has_log_changes(diff) {
            return false;
        }

        self.mutate(|state| {
            let before: HashSet<&str> = state.logs.iter().map(|r| r.id.as_str()).collect();
            let next = engine::apply_diff(state, diff);

            let inserted = next
                .logs
                .iter()
                .filter(|r| !before.contains(r.id.as_str()))
                .cloned()
                .collect();
            let updated = diff
                .updated
                .iter()
                .filter(|r| before.contains(r.id.as_str()) && !diff.deleted_ids.contains(&r.id))
                .cloned()
                .collect();
            let deleted = diff
                .deleted_ids
                .iter()
                .filter(|id| before.contains(id.as_str()))
                .cloned()
                .collect();

            Some((
                next,
                CacheEvent::DiffApplied {
                    inserted,
                    updated,
                    deleted,
                },
            ))
        })
    }

    /// Insert or replace one record (push fast path).
    pub fn add_log(&self, record: LogRecord) -> bool {
        self.mutate(|state| {
            let replaced = state.contains(&record.id);
            let next = engine::upsert_record(state, record.clone());
            Some((next, CacheEvent::Upserted { record, replaced }))
        })
    }

    /// Remove one record by id. No-op if absent. The cursor is unaffected.
    pub fn remove_log(&self, id: &str) -> bool {
        self.mutate(|state| {
            let next = engine::remove_record(state, id)?;
            Some((next, CacheEvent::Removed { id: id.to_string() }))
        })
    }

    /// Drop every record and the cursor, and zero the hit/miss counters.
    /// The version keeps counting up so observers still see a change.
    pub fn clear(&self) {
        let cleared = self.mutate(|state| {
            let next = LogState {
                version: state.version + 1,
                ..LogState::new()
            };
            Some((next, CacheEvent::Cleared))
        });
        if cleared {
            self.hits.store(0, Ordering::Relaxed);
            self.misses.store(0, Ordering::Relaxed);
        }
    }

    /// Enforce the configured retention bounds. Returns the number of records
    /// evicted.
    pub fn optimize(&self) -> usize {
        self.optimize_at(Utc::now())
    }

    /// [`Self::optimize`] against an explicit clock reading.
    pub fn optimize_at(&self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        self.mutate(|state| {
            let next = engine::optimize_log_state(
                state,
                self.settings.max_entries,
                self.settings.retain_period,
                now,
            );
            if next.version == state.version {
                return None;
            }
            evicted = state.len() - next.len();
            Some((next, CacheEvent::Optimized { evicted }))
        });

        if evicted > 0 {
            tracing::debug!(evicted, "log cache optimized");
        }
        evicted
    }

    /// Stop accepting mutations and drop all observers. Reads keep working
    /// against the last state.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.observers.clear();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// The current state. Later mutations never touch the returned value.
    #[must_use]
    pub fn snapshot(&self) -> Arc<LogState> {
        Arc::clone(&self.read().state)
    }

    /// All records, oldest first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogRecord> {
        self.snapshot().logs.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    #[must_use]
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_timestamp
    }

    #[must_use]
    pub fn has_log(&self, id: &str) -> bool {
        let found = self.snapshot().contains(id);
        self.record_lookup(found);
        found
    }

    #[must_use]
    pub fn get_log(&self, id: &str) -> Option<LogRecord> {
        let record = self.snapshot().get(id).cloned();
        self.record_lookup(record.is_some());
        record
    }

    #[must_use]
    pub fn get_logs_by_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.filtered(|r| r.level == level)
    }

    #[must_use]
    pub fn get_logs_by_source(&self, source: &str) -> Vec<LogRecord> {
        self.filtered(|r| r.source == source)
    }

    /// Records strictly newer than `since`, matching the poll cursor's
    /// exclusive bound.
    #[must_use]
    pub fn get_logs_since(&self, since: DateTime<Utc>) -> Vec<LogRecord> {
        let state = self.snapshot();
        let start = state.logs.partition_point(|r| r.timestamp <= since);
        state.logs[start..].to_vec()
    }

    /// The next poll query, derived from the state current right now.
    #[must_use]
    pub fn create_query(&self, filters: &QueryFilters) -> DiffQuery {
        engine::create_incremental_query(&self.snapshot(), filters)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (state, last_updated) = {
            let inner = self.read();
            (Arc::clone(&inner.state), inner.last_updated)
        };
        CacheStats {
            total_logs: state.len(),
            version: state.version,
            last_timestamp: state.last_timestamp,
            last_updated,
            oldest: state.oldest().map(|r| r.timestamp),
            newest: state.newest().map(|r| r.timestamp),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    // ── Observers ──────────────────────────────────────────────────

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Replace the state with `f(current)`, then notify observers outside
    /// the lock. `f` returning `None` means "nothing changed".
    fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&LogState) -> Option<(LogState, CacheEvent)>,
    {
        if self.is_disposed() {
            tracing::debug!("mutation on disposed log cache discarded");
            return false;
        }

        let event = {
            let mut inner = self.write();
            let Some((next, event)) = f(&inner.state) else {
                return false;
            };
            inner.state = Arc::new(next);
            inner.last_updated = Some(Utc::now());
            event
        };

        self.observers.notify(&event);
        true
    }

    fn filtered<P>(&self, predicate: P) -> Vec<LogRecord>
    where
        P: Fn(&LogRecord) -> bool,
    {
        self.snapshot()
            .logs
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    fn record_lookup(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    fn rec(id: &str, minute: u32) -> LogRecord {
        LogRecord::new(id, ts(minute), LogLevel::Info, format!("message {id}"))
    }

    fn added(records: Vec<LogRecord>) -> LogDiff {
        LogDiff {
            added: records,
            ..LogDiff::default()
        }
    }

    fn record_events(cache: &LogCache) -> Arc<Mutex<Vec<CacheEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        cache.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[test]
    fn empty_diff_does_not_bump_version() {
        let cache = LogCache::default();
        assert!(cache.add_log(rec("a", 1)));
        let version = cache.version();

        assert!(!cache.apply_diff(&LogDiff::default()));
        assert_eq!(cache.version(), version);
        assert!(cache.stats().last_updated.is_some());
    }

    #[test]
    fn add_log_upserts() {
        let cache = LogCache::default();
        cache.add_log(rec("1", 1));
        let mut newer = rec("1", 2);
        newer.message = "updated".into();
        cache.add_log(newer);

        let logs = cache.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].timestamp, ts(2));
        assert_eq!(logs[0].message, "updated");
    }

    #[test]
    fn remove_log_is_noop_when_absent() {
        let cache = LogCache::default();
        cache.add_log(rec("a", 1));
        let version = cache.version();

        assert!(!cache.remove_log("missing"));
        assert_eq!(cache.version(), version);
        assert!(cache.remove_log("a"));
        assert!(cache.is_empty());
        assert_eq!(cache.last_timestamp(), Some(ts(1)));
    }

    #[test]
    fn lookups_count_hits_and_misses() {
        let cache = LogCache::default();
        cache.add_log(rec("a", 1));

        assert!(cache.has_log("a"));
        assert!(cache.get_log("a").is_some());
        assert!(!cache.has_log("b"));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);

        cache.clear();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
        assert_eq!(stats.total_logs, 0);
        assert_eq!(stats.last_timestamp, None);
    }

    #[test]
    fn filtered_lookups() {
        let cache = LogCache::default();
        cache.apply_diff(&added(vec![
            rec("a", 1).with_source("runner"),
            LogRecord::new("b", ts(2), LogLevel::Error, "boom").with_source("api"),
            rec("c", 3).with_source("runner"),
        ]));

        let by_source: Vec<_> = cache
            .get_logs_by_source("runner")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(by_source, vec!["a", "c"]);

        let errors = cache.get_logs_by_level(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, "b");

        let since: Vec<_> = cache
            .get_logs_since(ts(2))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(since, vec!["c"]);
    }

    #[test]
    fn observers_see_only_effective_changes() {
        let cache = LogCache::default();
        cache.add_log(rec("a", 1));
        let events = record_events(&cache);

        cache.apply_diff(&LogDiff {
            added: vec![rec("a", 1), rec("b", 2)],
            updated: vec![rec("ghost", 3)],
            deleted_ids: BTreeSet::from(["nope".to_string()]),
            version: Some("7".into()),
        });

        assert_eq!(
            *events.lock().unwrap(),
            vec![CacheEvent::DiffApplied {
                inserted: vec![rec("b", 2)],
                updated: vec![],
                deleted: vec![],
            }]
        );
    }

    #[test]
    fn optimize_uses_configured_bounds() {
        let cache = LogCache::new(CacheSettings {
            max_entries: 2,
            retain_period: Duration::from_secs(3600),
        });
        cache.apply_diff(&added((1..=4).map(|m| rec(&format!("r{m}"), m)).collect()));
        let events = record_events(&cache);

        assert_eq!(cache.optimize_at(ts(30)), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.last_timestamp(), Some(ts(4)));
        assert_eq!(cache.optimize_at(ts(30)), 0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![CacheEvent::Optimized { evicted: 2 }]
        );
    }

    #[test]
    fn disposed_cache_rejects_mutations() {
        let cache = LogCache::default();
        cache.add_log(rec("a", 1));
        cache.dispose();

        assert!(!cache.add_log(rec("b", 2)));
        assert!(!cache.apply_diff(&added(vec![rec("c", 3)])));
        assert!(!cache.remove_log("a"));
        cache.clear();
        assert_eq!(cache.len(), 1);
        assert!(cache.is_disposed());
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutations() {
        let cache = LogCache::default();
        cache.add_log(rec("a", 1));
        let before = cache.snapshot();
        cache.add_log(rec("b", 2));

        assert_eq!(before.len(), 1);
        assert_eq!(cache.len(), 2);
    }
}
