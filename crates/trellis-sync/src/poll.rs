//! The poll scheduler: periodic fetch-and-merge against one cache.
//!
//! Each fetch builds its cursor from the cache state current at that moment.
//! The next tick is armed only after the fetch settles, and a failed fetch is
//! recorded and otherwise ignored so the loop never stops on its own. An
//! early trigger runs the same step out of band without moving the timer.
//! A rate-limited fetch pushes the next tick past the server's `Retry-After`
//! and early triggers are ignored until then.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use trellis_cache::LogCache;
use trellis_core::entities::{DiffSize, QueryFilters};

use crate::error::SyncError;
use crate::lock;
use crate::source::DiffSource;

/// Out-of-band "fetch now" signal.
///
/// Firing while a fetch is already running queues exactly one follow-up
/// fetch; repeated fires before it starts collapse into it.
#[derive(Debug, Clone, Default)]
pub struct PollTrigger(Arc<Notify>);

impl PollTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.notify_one();
    }

    pub async fn fired(&self) {
        self.0.notified().await;
    }
}

/// Result of one fetch-and-merge step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The diff changed the cache.
    Applied(DiffSize),
    /// The server reported nothing new.
    Unchanged,
    Failed(String),
    /// The cache was disposed; nothing was fetched or the result was dropped.
    Skipped,
}

pub struct Poller<S> {
    source: S,
    cache: Arc<LogCache>,
    filters: QueryFilters,
    interval: Duration,
    trigger: PollTrigger,
    in_flight: tokio::sync::Mutex<()>,
    last_error: Mutex<Option<String>>,
    last_poll: Mutex<Option<DateTime<Utc>>>,
    backoff_until: Mutex<Option<Instant>>,
}

impl<S> std::fmt::Debug for Poller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl<S: DiffSource> Poller<S> {
    #[must_use]
    pub fn new(
        source: S,
        cache: Arc<LogCache>,
        filters: QueryFilters,
        interval: Duration,
        trigger: PollTrigger,
    ) -> Self {
        Self {
            source,
            cache,
            filters,
            interval,
            trigger,
            in_flight: tokio::sync::Mutex::new(()),
            last_error: Mutex::new(None),
            last_poll: Mutex::new(None),
            backoff_until: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn trigger(&self) -> PollTrigger {
        self.trigger.clone()
    }

    /// Error from the most recent fetch, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// When the most recent fetch settled.
    #[must_use]
    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_poll)
    }

    /// Run one fetch-and-merge step. Concurrent calls are serialized.
    pub async fn poll_once(&self) -> PollOutcome {
        let _guard = self.in_flight.lock().await;
        if self.cache.is_disposed() {
            return PollOutcome::Skipped;
        }

        let query = self.cache.create_query(&self.filters);
        let result = self.source.fetch_diff(&query).await;
        *lock(&self.last_poll) = Some(Utc::now());

        match result {
            Ok(diff) => {
                *lock(&self.last_error) = None;
                *lock(&self.backoff_until) = None;
                if self.cache.is_disposed() {
                    tracing::debug!("discarding diff for disposed cache");
                    return PollOutcome::Skipped;
                }
                let size = diff.size();
                if self.cache.apply_diff(&diff) {
                    tracing::debug!(
                        added = size.added_count,
                        updated = size.updated_count,
                        deleted = size.deleted_count,
                        "log diff applied"
                    );
                    PollOutcome::Applied(size)
                } else {
                    PollOutcome::Unchanged
                }
            }
            Err(error) => {
                if let SyncError::RateLimited { retry_after_secs } = &error {
                    *lock(&self.backoff_until) =
                        Some(Instant::now() + Duration::from_secs(*retry_after_secs));
                }
                tracing::warn!(%error, "log poll failed");
                let message = error.to_string();
                *lock(&self.last_error) = Some(message.clone());
                PollOutcome::Failed(message)
            }
        }
    }

    /// Start the scheduling loop: one catch-up fetch, then one fetch per
    /// interval plus one per trigger.
    #[must_use]
    pub fn spawn(self: &Arc<Self>) -> PollHandle {
        let poller = Arc::clone(self);
        PollHandle {
            task: tokio::spawn(async move { poller.run().await }),
        }
    }

    /// The server asked us to hold off until this instant.
    fn backoff(&self) -> Option<Instant> {
        lock(&self.backoff_until).filter(|until| *until > Instant::now())
    }

    fn next_deadline(&self) -> Instant {
        let tick = Instant::now() + self.interval;
        self.backoff().map_or(tick, |until| until.max(tick))
    }

    async fn run(&self) {
        self.poll_once().await;
        let mut deadline = self.next_deadline();

        while !self.cache.is_disposed() {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => {
                    self.poll_once().await;
                    deadline = self.next_deadline();
                }
                () = self.trigger.fired() => {
                    if self.backoff().is_some() {
                        tracing::debug!("diff hint ignored while rate limited");
                        continue;
                    }
                    tracing::debug!("diff hint received, polling early");
                    self.poll_once().await;
                    if let Some(until) = self.backoff() {
                        deadline = deadline.max(until);
                    }
                }
            }
        }
        tracing::debug!("poll loop stopped: cache disposed");
    }
}

/// Owns the spawned loop. Dropping the handle stops it.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Cancel the pending timer and any fetch in flight.
    pub fn stop(&self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
