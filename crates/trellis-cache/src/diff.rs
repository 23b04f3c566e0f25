//! Diff engine: pure transformations over [`LogState`].
//!
//! Every function takes a state by reference and returns a new state (or
//! `None` when nothing changed). The resulting `logs` are always sorted
//! ascending by timestamp with a stable sort, so records with equal
//! timestamps keep their prior relative order and newly inserted ones land
//! after them.
//!
//! The cursor (`last_timestamp`) only moves forward. It is the maximum of its
//! previous value and the newest timestamp present, so deletes and eviction
//! never rewind it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use trellis_core::entities::{DiffQuery, DiffSize, LogDiff, LogRecord, LogState, QueryFilters};

/// True iff any of the diff's three collections is non-empty.
#[must_use]
pub fn has_log_changes(diff: &LogDiff) -> bool {
    diff.has_changes()
}

/// Apply one diff.
///
/// 1. drop records named in `deleted_ids`
/// 2. replace records matched by id from `updated` (unknown ids are ignored)
/// 3. append `added` records whose id is not already present
/// 4. stable re-sort by timestamp
/// 5. advance the cursor, bump `version` by exactly one
///
/// A diff without changes returns the state unchanged, version included.
#[must_use]
pub fn apply_diff(state: &LogState, diff: &LogDiff) -> LogState {
    if !has_log_changes(diff) {
        return state.clone();
    }

    let mut logs: Vec<LogRecord> = state
        .logs
        .iter()
        .filter(|r| !diff.deleted_ids.contains(&r.id))
        .cloned()
        .collect();

    let mut index: HashMap<String, usize> = logs
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();

    for record in &diff.updated {
        if let Some(&i) = index.get(&record.id) {
            logs[i] = record.clone();
        }
    }

    for record in &diff.added {
        if !index.contains_key(&record.id) {
            index.insert(record.id.clone(), logs.len());
            logs.push(record.clone());
        }
    }

    sort_by_timestamp(&mut logs);
    let last_timestamp = advance_cursor(state.last_timestamp, &logs);

    LogState {
        logs,
        last_timestamp,
        version: state.version + 1,
    }
}

/// Insert a single record, or replace the record with the same id.
#[must_use]
pub fn upsert_record(state: &LogState, record: LogRecord) -> LogState {
    let mut logs = state.logs.clone();
    match state.position(&record.id) {
        Some(i) => logs[i] = record,
        None => logs.push(record),
    }

    sort_by_timestamp(&mut logs);
    let last_timestamp = advance_cursor(state.last_timestamp, &logs);

    LogState {
        logs,
        last_timestamp,
        version: state.version + 1,
    }
}

/// Remove a record by id. `None` if no such record exists. The cursor is
/// left untouched.
#[must_use]
pub fn remove_record(state: &LogState, id: &str) -> Option<LogState> {
    let position = state.position(id)?;
    let mut logs = state.logs.clone();
    logs.remove(position);

    Some(LogState {
        logs,
        last_timestamp: state.last_timestamp,
        version: state.version + 1,
    })
}

/// Build the next poll's query: exclusive lower bound from the cursor plus
/// caller filters. Pure, so any number of schedulers may derive queries from
/// the same snapshot and agree.
#[must_use]
pub fn create_incremental_query(state: &LogState, filters: &QueryFilters) -> DiffQuery {
    DiffQuery {
        since: state.last_timestamp,
        limit: filters.limit,
        level: filters.level,
        source: filters.source.clone(),
    }
}

/// Enforce the retention bounds: first drop records older than
/// `now - retain_period`, then trim the oldest records until at most
/// `max_entries` remain.
///
/// Returns the state unchanged (same version) when nothing is evicted. The
/// cursor is retained even if the newest record is evicted.
#[must_use]
pub fn optimize_log_state(
    state: &LogState,
    max_entries: usize,
    retain_period: Duration,
    now: DateTime<Utc>,
) -> LogState {
    let cutoff = TimeDelta::from_std(retain_period)
        .ok()
        .and_then(|period| now.checked_sub_signed(period));

    // Sorted ascending, so both bounds trim a prefix.
    let expired = cutoff.map_or(0, |cutoff| {
        state.logs.partition_point(|r| r.timestamp < cutoff)
    });
    let remaining = state.logs.len() - expired;
    let over_count = remaining.saturating_sub(max_entries);
    let first_kept = expired + over_count;

    if first_kept == 0 {
        return state.clone();
    }

    LogState {
        logs: state.logs[first_kept..].to_vec(),
        last_timestamp: state.last_timestamp,
        version: state.version + 1,
    }
}

/// Entry counts of a diff, for diagnostics.
#[must_use]
pub fn calculate_diff_size(diff: &LogDiff) -> DiffSize {
    diff.size()
}

fn sort_by_timestamp(logs: &mut [LogRecord]) {
    // `sort_by_key` is stable.
    logs.sort_by_key(|r| r.timestamp);
}

fn advance_cursor(previous: Option<DateTime<Utc>>, logs: &[LogRecord]) -> Option<DateTime<Utc>> {
    previous.max(logs.last().map(|r| r.timestamp))
}
