//! The reconciliation coordinator.
//!
//! [`LogSync`] composes one cache, one push channel and one poll scheduler
//! for a single scope and exposes them as a single surface. A record that
//! arrives through both channels is stored once because the cache
//! de-duplicates by id; nothing here tracks which channel delivered what.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use trellis_cache::{CacheEvent, CacheSettings, CacheStats, LogCache};
use trellis_config::TrellisConfig;
use trellis_core::entities::{LogRecord, PushEvent, QueryFilters};
use trellis_core::enums::LogScope;
use trellis_core::observers::SubscriptionId;

use crate::error::SyncError;
use crate::lock;
use crate::poll::{PollHandle, PollOutcome, PollTrigger, Poller};
use crate::push::{PushChannel, PushSettings};
use crate::source::{DiffSource, HttpDiffSource};
use crate::status::{ConnectionPhase, ConnectionStatus};
use crate::transport::{EventTransport, HttpEventTransport};

/// Everything one [`LogSync`] needs, resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub scope: LogScope,
    pub cache: CacheSettings,
    pub auto_optimize: bool,
    pub optimize_interval: Duration,
    pub poll_interval: Duration,
    pub filters: QueryFilters,
    /// Run the poll scheduler.
    pub polling_enabled: bool,
    /// Insert pushed records and poll results into the cache. When off, push
    /// events still reach event observers.
    pub cache_enabled: bool,
    pub push: PushSettings,
}

impl SyncOptions {
    #[must_use]
    pub fn from_config(config: &TrellisConfig, scope: LogScope) -> Self {
        let cache_enabled = !scope.is_global() || config.sync.enable_global_log_cache;
        Self {
            cache: CacheSettings::from(&config.cache),
            auto_optimize: config.cache.auto_optimize,
            optimize_interval: config.cache.optimize_interval(),
            poll_interval: config.sync.poll_interval(scope.is_global()),
            filters: QueryFilters {
                limit: config.sync.poll_limit,
                ..QueryFilters::default()
            },
            polling_enabled: config.sync.enable_log_polling && cache_enabled,
            cache_enabled,
            push: PushSettings::from_config(config, &scope),
            scope,
        }
    }

    /// Narrow every poll with these filters. The configured limit is kept
    /// unless `filters` sets one.
    #[must_use]
    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        let limit = filters.limit.or(self.filters.limit);
        self.filters = QueryFilters { limit, ..filters };
        self
    }
}

/// Combined connectivity view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub connected: bool,
    pub phase: ConnectionPhase,
    /// Push error if any, otherwise the last poll error.
    pub error: Option<String>,
    pub last_event_time: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
}

pub struct LogSync<S, T> {
    options: SyncOptions,
    cache: Arc<LogCache>,
    push: PushChannel<T>,
    poller: Option<Arc<Poller<S>>>,
    poll_handle: Mutex<Option<PollHandle>>,
    optimizer: Mutex<Option<JoinHandle<()>>>,
}

impl<S, T> std::fmt::Debug for LogSync<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSync")
            .field("scope", &self.options.scope)
            .field("cache", &self.cache)
            .field("push", &self.push)
            .field("polling", &self.poller.is_some())
            .finish_non_exhaustive()
    }
}

impl LogSync<HttpDiffSource, HttpEventTransport> {
    /// HTTP-backed sync for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the server section is not configured,
    /// or [`SyncError::Http`] if a client cannot be built.
    pub fn from_config(config: &TrellisConfig, scope: LogScope) -> Result<Self, SyncError> {
        let options = SyncOptions::from_config(config, scope);
        Self::with_options(config, options)
    }

    /// HTTP-backed sync with explicit options.
    ///
    /// # Errors
    ///
    /// See [`Self::from_config`].
    pub fn with_options(config: &TrellisConfig, options: SyncOptions) -> Result<Self, SyncError> {
        let server = config.require_server()?;
        let source = HttpDiffSource::new(server, &options.scope)?;
        let transport = HttpEventTransport::new(server.request_timeout())?;
        Ok(Self::new(options, source, transport))
    }
}

impl<S: DiffSource, T: EventTransport> LogSync<S, T> {
    /// Timer periods below one second are raised to one second.
    #[must_use]
    pub fn new(mut options: SyncOptions, source: S, transport: T) -> Self {
        options.poll_interval = timer_period("poll", options.poll_interval);
        options.optimize_interval = timer_period("optimize", options.optimize_interval);
        let cache = Arc::new(LogCache::new(options.cache));
        let trigger = PollTrigger::new();

        let poller = options.polling_enabled.then(|| {
            Arc::new(Poller::new(
                source,
                Arc::clone(&cache),
                options.filters.clone(),
                options.poll_interval,
                trigger.clone(),
            ))
        });

        let mut builder = PushChannel::builder(transport, options.push.clone());
        if options.cache_enabled {
            builder = builder.cache(Arc::clone(&cache));
        }
        if poller.is_some() {
            builder = builder.diff_trigger(trigger);
        }

        Self {
            options,
            cache,
            push: builder.build(),
            poller,
            poll_handle: Mutex::new(None),
            optimizer: Mutex::new(None),
        }
    }

    /// Connect the push channel and start the poll and optimize timers.
    /// Calling it again restarts everything.
    pub fn start(&self) {
        self.stop_timers();
        tracing::info!(scope = %self.options.scope, "starting log sync");

        if !self.push.connect() {
            tracing::info!(scope = %self.options.scope, "push channel unavailable, polling only");
        }
        if let Some(poller) = &self.poller {
            *lock(&self.poll_handle) = Some(poller.spawn());
        }
        if self.options.cache_enabled && self.options.auto_optimize {
            *lock(&self.optimizer) = Some(spawn_optimizer(
                Arc::clone(&self.cache),
                self.options.optimize_interval,
            ));
        }
    }

    /// Stop every timer, close the connection and retire the cache.
    pub fn dispose(&self) {
        self.stop_timers();
        self.push.disconnect();
        self.cache.dispose();
        tracing::debug!(scope = %self.options.scope, "log sync disposed");
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let push = self.push.status();
        let error = push
            .last_error
            .clone()
            .or_else(|| self.poller.as_ref().and_then(|poller| poller.last_error()));
        SyncStatus {
            connected: push.connected(),
            phase: push.phase,
            error,
            last_event_time: push.last_event_time,
            reconnect_attempts: push.reconnect_attempts,
        }
    }

    /// Cached records, oldest first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogRecord> {
        self.cache.logs()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Reset the reconnect counter and reconnect the push channel.
    pub fn reconnect(&self) -> bool {
        self.push.reconnect()
    }

    /// Fetch and merge now, outside the poll cadence.
    pub async fn refresh(&self) -> PollOutcome {
        match &self.poller {
            Some(poller) => poller.poll_once().await,
            None => PollOutcome::Skipped,
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Returns the number of evicted records.
    pub fn optimize(&self) -> usize {
        self.cache.optimize()
    }

    pub fn subscribe_logs<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.cache.subscribe(observer)
    }

    pub fn unsubscribe_logs(&self, id: SubscriptionId) -> bool {
        self.cache.unsubscribe(id)
    }

    pub fn subscribe_events<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        self.push.subscribe_events(observer)
    }

    pub fn unsubscribe_events(&self, id: SubscriptionId) -> bool {
        self.push.unsubscribe_events(id)
    }

    pub fn subscribe_status<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.push.subscribe_status(observer)
    }

    pub fn unsubscribe_status(&self, id: SubscriptionId) -> bool {
        self.push.unsubscribe_status(id)
    }
}

impl<S, T> LogSync<S, T> {
    fn stop_timers(&self) {
        if let Some(handle) = lock(&self.poll_handle).take() {
            handle.stop();
        }
        if let Some(handle) = lock(&self.optimizer).take() {
            handle.abort();
        }
    }
}

impl<S, T> Drop for LogSync<S, T> {
    fn drop(&mut self) {
        self.stop_timers();
        self.cache.dispose();
    }
}

const MIN_TIMER_PERIOD: Duration = Duration::from_secs(1);

fn timer_period(timer: &str, period: Duration) -> Duration {
    if period < MIN_TIMER_PERIOD {
        tracing::warn!(timer, ?period, "timer period too short, using 1s");
        MIN_TIMER_PERIOD
    } else {
        period
    }
}

fn spawn_optimizer(cache: Arc<LogCache>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if cache.is_disposed() {
                break;
            }
            cache.optimize();
        }
    })
}
