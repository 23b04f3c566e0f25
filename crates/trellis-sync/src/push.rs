//! The push channel: one long-lived event stream with bounded reconnection.
//!
//! A single spawned driver task owns the connection and the reconnect timer.
//! Every `connect()` bumps a generation counter and replaces the driver, so a
//! superseded driver can neither touch the status nor deliver events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use trellis_cache::LogCache;
use trellis_config::TrellisConfig;
use trellis_core::entities::{LogRecord, PushEvent};
use trellis_core::enums::{LogScope, PushEventKind};
use trellis_core::observers::{ObserverRegistry, SubscriptionId};

use crate::error::SyncError;
use crate::http::events_url;
use crate::lock;
use crate::poll::PollTrigger;
use crate::sse::SseFrame;
use crate::status::{ConnectionStatus, ReconnectDecision};
use crate::transport::EventTransport;
use crate::wire::decode_event;

/// Connection prerequisites and retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSettings {
    /// Event-stream address; `None` makes `connect()` a no-op.
    pub url: Option<String>,
    pub auth_token: Option<String>,
    /// Without a token, `connect()` is a no-op.
    pub require_auth: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_interval: Duration,
}

impl PushSettings {
    #[must_use]
    pub fn from_config(config: &TrellisConfig, scope: &LogScope) -> Self {
        Self {
            url: config
                .server
                .is_configured()
                .then(|| events_url(&config.server.base_url, scope)),
            auth_token: config.server.token().map(str::to_owned),
            require_auth: config.server.require_auth,
            max_reconnect_attempts: config.stream.max_reconnect_attempts,
            reconnect_interval: config.stream.reconnect_interval(),
        }
    }
}

struct Shared<T> {
    transport: T,
    settings: PushSettings,
    cache: Option<Arc<LogCache>>,
    diff_trigger: Option<PollTrigger>,
    status: Mutex<ConnectionStatus>,
    generation: AtomicU64,
    driver: Mutex<Option<JoinHandle<()>>>,
    events: ObserverRegistry<PushEvent>,
    status_observers: ObserverRegistry<ConnectionStatus>,
}

pub struct PushChannelBuilder<T> {
    transport: T,
    settings: PushSettings,
    cache: Option<Arc<LogCache>>,
    diff_trigger: Option<PollTrigger>,
}

impl<T: EventTransport> PushChannelBuilder<T> {
    /// Insert pushed `log-created` records into this cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<LogCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fire this trigger on `diff-available` hints.
    #[must_use]
    pub fn diff_trigger(mut self, trigger: PollTrigger) -> Self {
        self.diff_trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn build(self) -> PushChannel<T> {
        PushChannel {
            shared: Arc::new(Shared {
                transport: self.transport,
                settings: self.settings,
                cache: self.cache,
                diff_trigger: self.diff_trigger,
                status: Mutex::new(ConnectionStatus::default()),
                generation: AtomicU64::new(0),
                driver: Mutex::new(None),
                events: ObserverRegistry::new(),
                status_observers: ObserverRegistry::new(),
            }),
        }
    }
}

/// Manages the event-stream connection for one scope.
///
/// `connect`, `disconnect` and `reconnect` must be called from within a
/// Tokio runtime.
pub struct PushChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> std::fmt::Debug for PushChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("url", &self.shared.settings.url)
            .field("status", &*lock(&self.shared.status))
            .finish_non_exhaustive()
    }
}

impl<T: EventTransport> PushChannel<T> {
    #[must_use]
    pub fn builder(transport: T, settings: PushSettings) -> PushChannelBuilder<T> {
        PushChannelBuilder {
            transport,
            settings,
            cache: None,
            diff_trigger: None,
        }
    }

    /// Open the event stream, replacing any existing connection.
    ///
    /// Returns `false` without touching the state when the address is
    /// missing, or when auth is required and no token is available.
    pub fn connect(&self) -> bool {
        let settings = &self.shared.settings;
        if settings.url.is_none() {
            tracing::debug!("event stream address not configured, not connecting");
            return false;
        }
        if settings.require_auth && settings.auth_token.is_none() {
            tracing::debug!("event stream requires auth and no token is available");
            return false;
        }

        self.stop_driver();
        let (generation, snapshot) = {
            let mut status = lock(&self.shared.status);
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            status.begin_connect();
            (generation, status.clone())
        };
        self.shared.status_observers.notify(&snapshot);

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move { drive(shared, generation).await });
        *lock(&self.shared.driver) = Some(handle);
        true
    }

    /// Cancel any pending reconnect, close the connection and clear the
    /// error. Safe to call repeatedly and from any state.
    pub fn disconnect(&self) {
        let snapshot = {
            let mut status = lock(&self.shared.status);
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            status.mark_disconnected();
            status.clone()
        };
        self.stop_driver();
        self.shared.status_observers.notify(&snapshot);
    }

    /// Reset the attempt counter and connect. Recovers from `Failed`.
    pub fn reconnect(&self) -> bool {
        lock(&self.shared.status).reset_attempts();
        self.connect()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        lock(&self.shared.status).clone()
    }

    pub fn subscribe_events<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(observer)
    }

    pub fn unsubscribe_events(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    pub fn subscribe_status<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.shared.status_observers.subscribe(observer)
    }

    pub fn unsubscribe_status(&self, id: SubscriptionId) -> bool {
        self.shared.status_observers.unsubscribe(id)
    }

    fn stop_driver(&self) {
        if let Some(handle) = lock(&self.shared.driver).take() {
            handle.abort();
        }
    }
}

impl<T> Drop for PushChannel<T> {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = lock(&self.shared.driver).take() {
            handle.abort();
        }
    }
}

impl<T> Shared<T> {
    /// Apply `f` to the status if `generation` is still current, then notify
    /// status observers outside the lock.
    fn update<R>(&self, generation: u64, f: impl FnOnce(&mut ConnectionStatus) -> R) -> Option<R> {
        let (result, snapshot) = {
            let mut status = lock(&self.status);
            if self.generation.load(Ordering::SeqCst) != generation {
                return None;
            }
            let result = f(&mut status);
            (result, status.clone())
        };
        self.status_observers.notify(&snapshot);
        Some(result)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn handle_frame(&self, generation: u64, frame: &SseFrame) {
        if !self.is_current(generation) {
            return;
        }
        let event = match decode_event(frame) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(%error, event = ?frame.event, "dropping malformed event");
                return;
            }
        };
        if self.update(generation, |status| status.record_event(Utc::now())).is_none() {
            return;
        }

        match event.kind {
            PushEventKind::LogCreated => self.insert_pushed_log(&event),
            PushEventKind::DiffAvailable => {
                if let Some(trigger) = &self.diff_trigger {
                    trigger.fire();
                }
            }
            _ => {}
        }
        self.events.notify(&event);
    }

    fn insert_pushed_log(&self, event: &PushEvent) {
        let Some(cache) = &self.cache else {
            return;
        };
        match LogRecord::from_value(event.data.clone()) {
            Ok(record) => {
                cache.add_log(record);
            }
            Err(error) => tracing::warn!(%error, "dropping malformed pushed log record"),
        }
    }
}

/// Fixed reconnect interval, stretched to the server's `Retry-After` on 429.
fn retry_delay(failure: &SyncError, interval: Duration) -> Duration {
    match failure {
        SyncError::RateLimited { retry_after_secs } => {
            interval.max(Duration::from_secs(*retry_after_secs))
        }
        _ => interval,
    }
}

async fn drive<T: EventTransport>(shared: Arc<Shared<T>>, generation: u64) {
    let Some(url) = shared.settings.url.as_deref() else {
        return;
    };
    let max_attempts = shared.settings.max_reconnect_attempts;

    loop {
        let failure = match shared
            .transport
            .open(url, shared.settings.auth_token.as_deref())
            .await
        {
            Ok(mut stream) => {
                if shared.update(generation, ConnectionStatus::mark_open).is_none() {
                    return;
                }
                tracing::info!(%url, "event stream connected");
                loop {
                    match stream.next().await {
                        Some(Ok(frame)) => shared.handle_frame(generation, &frame),
                        Some(Err(error)) => break error,
                        None => break SyncError::StreamClosed,
                    }
                }
            }
            Err(error) => error,
        };

        let message = failure.to_string();
        let Some(decision) =
            shared.update(generation, |status| status.record_failure(&message, max_attempts))
        else {
            return;
        };
        match decision {
            ReconnectDecision::Retry { attempt } => {
                tracing::warn!(
                    error = %failure,
                    attempt,
                    max_attempts,
                    "event stream failed, reconnecting"
                );
                tokio::time::sleep(retry_delay(&failure, shared.settings.reconnect_interval))
                    .await;
                if shared.update(generation, ConnectionStatus::begin_connect).is_none() {
                    return;
                }
            }
            ReconnectDecision::GiveUp => {
                tracing::error!(
                    error = %failure,
                    max_attempts,
                    "event stream failed permanently"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn retry_delay_honours_retry_after() {
        let interval = Duration::from_secs(3);
        let limited = |secs| SyncError::RateLimited {
            retry_after_secs: secs,
        };
        assert_eq!(retry_delay(&limited(30), interval), Duration::from_secs(30));
        assert_eq!(retry_delay(&limited(1), interval), interval);
        assert_eq!(retry_delay(&SyncError::StreamClosed, interval), interval);
    }
}
