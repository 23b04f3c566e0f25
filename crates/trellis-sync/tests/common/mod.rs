//! In-memory collaborators for driving the sync loops under paused time.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use futures::{StreamExt, stream};
use serde_json::json;
use trellis_core::entities::{DiffQuery, LogDiff, LogRecord};
use trellis_core::enums::LogLevel;
use trellis_sync::{DiffSource, EventStream, EventTransport, PushSettings, SseFrame, SyncError};

// ── Event transport ────────────────────────────────────────────────

/// One scripted `open()` outcome.
pub enum Step {
    Fail(String),
    /// Deliver the frames, then close the stream.
    Close(Vec<SseFrame>),
    /// Deliver the frames, then stay open forever.
    Hang(Vec<SseFrame>),
}

/// Replays [`Step`]s in order; once the script runs out every open fails.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let transport = Self::default();
        for step in steps {
            transport.push(step);
        }
        transport
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl EventTransport for ScriptedTransport {
    async fn open(&self, _url: &str, _auth_token: Option<&str>) -> Result<EventStream, SyncError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            None => Err(SyncError::Api {
                status: 503,
                message: "unavailable".into(),
            }),
            Some(Step::Fail(message)) => Err(SyncError::Api {
                status: 503,
                message,
            }),
            Some(Step::Close(frames)) => Ok(stream::iter(frames.into_iter().map(Ok)).boxed()),
            Some(Step::Hang(frames)) => Ok(stream::iter(frames.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
        }
    }
}

// ── Diff source ────────────────────────────────────────────────────

/// Replays queued results; an empty queue answers with an empty diff.
#[derive(Clone, Default)]
pub struct FakeDiffSource {
    responses: Arc<Mutex<VecDeque<Result<LogDiff, SyncError>>>>,
    queries: Arc<Mutex<Vec<DiffQuery>>>,
}

impl FakeDiffSource {
    pub fn new(responses: impl IntoIterator<Item = Result<LogDiff, String>>) -> Self {
        let source = Self::default();
        source
            .responses
            .lock()
            .unwrap()
            .extend(responses.into_iter().map(|response| {
                response.map_err(|message| SyncError::Api {
                    status: 500,
                    message,
                })
            }));
        source
    }

    /// Queue a specific error for the next unanswered fetch.
    pub fn fail_next(&self, error: SyncError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn queries(&self) -> Vec<DiffQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl DiffSource for FakeDiffSource {
    async fn fetch_diff(&self, query: &DiffQuery) -> Result<LogDiff, SyncError> {
        self.queries.lock().unwrap().push(query.clone());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(LogDiff::default()))
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

pub fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn record(id: &str, secs: i64) -> LogRecord {
    LogRecord::new(id, base() + TimeDelta::seconds(secs), LogLevel::Info, format!("message {id}"))
}

pub fn added(records: impl IntoIterator<Item = LogRecord>) -> LogDiff {
    LogDiff {
        added: records.into_iter().collect(),
        ..LogDiff::default()
    }
}

pub fn log_created(record: &LogRecord) -> SseFrame {
    SseFrame::named(
        "log-created",
        json!({ "type": "log_created", "entityId": record.id, "data": record }).to_string(),
    )
}

pub fn named(event: &str) -> SseFrame {
    SseFrame::named(event, json!({ "type": event, "data": {} }).to_string())
}

pub fn push_settings() -> PushSettings {
    PushSettings {
        url: Some("http://trellis.test/api/events".into()),
        auth_token: None,
        require_auth: false,
        max_reconnect_attempts: 5,
        reconnect_interval: Duration::from_secs(3),
    }
}

/// Collects everything an observer sees.
pub struct Recorder<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn sink(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let items = Arc::clone(&self.0);
        move |item: &T| items.lock().unwrap().push(item.clone())
    }

    pub fn items(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Let spawned tasks run until `condition` holds, advancing paused time in
/// small steps.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached within 100s of simulated time");
}
