use anyhow::Context;
use tokio::sync::mpsc;
use trellis_cache::CacheEvent;
use trellis_config::TrellisConfig;
use trellis_core::entities::{LogRecord, QueryFilters};
use trellis_core::enums::{LogLevel, LogScope, PushEventKind};
use trellis_sync::{ConnectionStatus, LogSync, PollOutcome, SyncOptions};

use crate::cli::{GlobalFlags, WatchArgs};
use crate::output;

enum Update {
    Record(LogRecord),
    Status(ConnectionStatus),
}

/// Handle `trl watch`.
pub async fn handle(
    args: &WatchArgs,
    config: &TrellisConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let scope = args
        .session
        .clone()
        .map_or(LogScope::Global, LogScope::Session);
    let filters = filters_from_args(args)?;
    let options = SyncOptions::from_config(config, scope).with_filters(filters.clone());
    let cache_enabled = options.cache_enabled;
    if !cache_enabled {
        tracing::warn!("global log cache is disabled; showing live records only");
    }

    let sync = LogSync::with_options(config, options).context("failed to set up log sync")?;

    if let PollOutcome::Failed(error) = sync.refresh().await {
        tracing::warn!(%error, "initial catch-up failed; waiting for live updates");
    }
    let backlog = sync.logs();
    let skip = backlog.len().saturating_sub(args.tail);
    for record in backlog.iter().skip(skip).filter(|r| matches(r, &filters)) {
        output::emit(&output::record_line(record, flags.format)?);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    if cache_enabled {
        let tx = tx.clone();
        sync.subscribe_logs(move |event| {
            for record in new_records(event) {
                let _ = tx.send(Update::Record(record));
            }
        });
    } else {
        let tx = tx.clone();
        sync.subscribe_events(move |event| {
            if event.kind != PushEventKind::LogCreated {
                return;
            }
            match LogRecord::from_value(event.data.clone()) {
                Ok(record) => {
                    let _ = tx.send(Update::Record(record));
                }
                Err(error) => tracing::warn!(%error, "skipping malformed live record"),
            }
        });
    }
    sync.subscribe_status(move |status| {
        let _ = tx.send(Update::Status(status.clone()));
    });

    sync.start();

    let mut last_phase = None;
    loop {
        tokio::select! {
            update = rx.recv() => {
                let Some(update) = update else { break };
                match update {
                    Update::Record(record) => {
                        if matches(&record, &filters) {
                            output::emit(&output::record_line(&record, flags.format)?);
                        }
                    }
                    Update::Status(status) => {
                        // Event watermarks arrive as status updates too; only
                        // phase changes are worth a line.
                        if last_phase != Some(status.phase) && !flags.quiet {
                            eprintln!("{}", output::status_line(&status, flags.format)?);
                        }
                        last_phase = Some(status.phase);
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    sync.dispose();
    Ok(())
}

fn filters_from_args(args: &WatchArgs) -> anyhow::Result<QueryFilters> {
    let level = args
        .level
        .as_deref()
        .map(str::parse::<LogLevel>)
        .transpose()
        .context("invalid --level")?;
    Ok(QueryFilters {
        level,
        source: args.source.clone(),
        limit: None,
    })
}

/// Records a cache change introduced for the first time.
fn new_records(event: &CacheEvent) -> Vec<LogRecord> {
    match event {
        CacheEvent::Upserted {
            record,
            replaced: false,
        } => vec![record.clone()],
        CacheEvent::DiffApplied { inserted, .. } => inserted.clone(),
        _ => Vec::new(),
    }
}

/// Pushed records bypass the server-side filters, so they are applied again
/// here.
fn matches(record: &LogRecord, filters: &QueryFilters) -> bool {
    filters.level.is_none_or(|level| record.level == level)
        && filters
            .source
            .as_deref()
            .is_none_or(|source| record.source == source)
}
