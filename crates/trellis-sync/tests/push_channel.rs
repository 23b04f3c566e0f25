mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    Recorder, ScriptedTransport, Step, log_created, named, push_settings, record, wait_until,
};
use pretty_assertions::assert_eq;
use trellis_cache::LogCache;
use trellis_core::entities::PushEvent;
use trellis_core::enums::PushEventKind;
use trellis_sync::{ConnectionPhase, ConnectionStatus, PollTrigger, PushChannel, PushSettings, SseFrame};

#[tokio::test(start_paused = true)]
async fn connect_without_address_is_a_noop() {
    let transport = ScriptedTransport::default();
    let channel = PushChannel::builder(
        transport.clone(),
        PushSettings {
            url: None,
            ..push_settings()
        },
    )
    .build();

    assert!(!channel.connect());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(channel.status().phase, ConnectionPhase::Disconnected);
    assert_eq!(transport.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_without_required_token_is_a_noop() {
    let transport = ScriptedTransport::default();
    let channel = PushChannel::builder(
        transport.clone(),
        PushSettings {
            require_auth: true,
            ..push_settings()
        },
    )
    .build();

    assert!(!channel.connect());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn log_events_reach_cache_and_observers() {
    let r1 = record("slog-1", 1);
    let transport = ScriptedTransport::new([Step::Hang(vec![
        log_created(&r1),
        SseFrame::named("log-created", "{oops"),
        named("session-update"),
        SseFrame::named("heartbeat", "{}"),
    ])]);
    let cache = Arc::new(LogCache::default());
    let channel = PushChannel::builder(transport.clone(), push_settings())
        .cache(Arc::clone(&cache))
        .build();
    let events: Recorder<PushEvent> = Recorder::new();
    channel.subscribe_events(events.sink());

    assert!(channel.connect());
    wait_until(|| events.len() == 2).await;

    let kinds: Vec<_> = events.items().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![PushEventKind::LogCreated, PushEventKind::SessionUpdate]);
    assert_eq!(cache.logs(), vec![r1]);

    let status = channel.status();
    assert!(status.connected());
    assert!(status.last_error.is_none());
    assert!(status.last_event_time.is_some());
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn session_events_do_not_touch_the_cache() {
    let transport = ScriptedTransport::new([Step::Hang(vec![
        named("task-created"),
        named("session-deleted"),
    ])]);
    let cache = Arc::new(LogCache::default());
    let channel = PushChannel::builder(transport, push_settings())
        .cache(Arc::clone(&cache))
        .build();
    let events: Recorder<PushEvent> = Recorder::new();
    channel.subscribe_events(events.sink());

    channel.connect();
    wait_until(|| events.len() == 2).await;
    assert!(cache.is_empty());
    assert_eq!(cache.version(), 0);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts_until_reconnect() {
    let transport = ScriptedTransport::default();
    let channel = PushChannel::builder(transport.clone(), push_settings()).build();

    channel.connect();
    wait_until(|| channel.status().is_failed()).await;

    let status = channel.status();
    assert_eq!(status.reconnect_attempts, 5);
    assert_eq!(transport.opens(), 5);
    assert!(
        status
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("connection failed after 5 attempts"))
    );

    // No further automatic attempts.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.opens(), 5);

    transport.push(Step::Hang(vec![]));
    assert!(channel.reconnect());
    wait_until(|| channel.status().connected()).await;
    assert_eq!(channel.status().reconnect_attempts, 0);
    assert_eq!(transport.opens(), 6);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_reports_retrying_error() {
    let transport = ScriptedTransport::new([Step::Fail("refused".into())]);
    let channel = PushChannel::builder(transport, push_settings()).build();

    channel.connect();
    wait_until(|| channel.status().phase == ConnectionPhase::Reconnecting).await;

    let status = channel.status();
    assert_eq!(status.reconnect_attempts, 1);
    assert!(
        status
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("connection failed:"))
    );
}

#[tokio::test(start_paused = true)]
async fn success_resets_attempt_counter() {
    let transport = ScriptedTransport::new([
        Step::Fail("refused".into()),
        Step::Fail("refused".into()),
        Step::Hang(vec![]),
    ]);
    let channel = PushChannel::builder(transport.clone(), push_settings()).build();

    channel.connect();
    wait_until(|| channel.status().connected()).await;
    assert_eq!(channel.status().reconnect_attempts, 0);
    assert!(channel.status().last_error.is_none());
    assert_eq!(transport.opens(), 3);
}

#[tokio::test(start_paused = true)]
async fn server_close_triggers_reconnect() {
    let transport = ScriptedTransport::new([Step::Close(vec![]), Step::Hang(vec![])]);
    let channel = PushChannel::builder(transport.clone(), push_settings()).build();
    let phases: Recorder<ConnectionPhase> = Recorder::new();
    channel.subscribe_status({
        let sink = phases.sink();
        move |status: &ConnectionStatus| sink(&status.phase)
    });

    channel.connect();
    wait_until(|| transport.opens() == 2 && channel.status().connected()).await;

    let seen = phases.items();
    assert!(seen.contains(&ConnectionPhase::Reconnecting));
    assert_eq!(seen.last(), Some(&ConnectionPhase::Connected));
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let transport = ScriptedTransport::new([Step::Fail("refused".into())]);
    let channel = PushChannel::builder(transport.clone(), push_settings()).build();

    channel.connect();
    wait_until(|| channel.status().phase == ConnectionPhase::Reconnecting).await;

    channel.disconnect();
    channel.disconnect();
    let status = channel.status();
    assert_eq!(status.phase, ConnectionPhase::Disconnected);
    assert!(status.last_error.is_none());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(channel.status().phase, ConnectionPhase::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn connect_replaces_existing_connection() {
    let transport = ScriptedTransport::new([Step::Hang(vec![]), Step::Hang(vec![])]);
    let channel = PushChannel::builder(transport.clone(), push_settings()).build();

    channel.connect();
    wait_until(|| channel.status().connected()).await;
    channel.connect();
    wait_until(|| transport.opens() == 2 && channel.status().connected()).await;
    assert_eq!(channel.status().reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn diff_hint_fires_poll_trigger() {
    let transport = ScriptedTransport::new([Step::Hang(vec![named("diff-available")])]);
    let trigger = PollTrigger::new();
    let channel = PushChannel::builder(transport, push_settings())
        .diff_trigger(trigger.clone())
        .build();

    channel.connect();
    let fired = tokio::time::timeout(Duration::from_secs(5), trigger.fired()).await;
    assert!(fired.is_ok());
}
