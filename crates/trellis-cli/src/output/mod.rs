use serde::Serialize;
use trellis_core::entities::LogRecord;
use trellis_sync::{ConnectionPhase, ConnectionStatus};

use crate::cli::OutputFormat;

/// Render one log record.
pub fn record_line(record: &LogRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(record)?),
        OutputFormat::Text => {
            let mut line = format!(
                "{} {:<5}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level.as_str().to_ascii_uppercase()
            );
            if let Some(task) = &record.task_id {
                line.push_str(&format!(" task:{task}"));
            } else if let Some(session) = &record.session_id {
                line.push_str(&format!(" session:{session}"));
            }
            if !record.source.is_empty() {
                line.push_str(&format!(" [{}]", record.source));
            }
            line.push(' ');
            line.push_str(&record.message);
            Ok(line)
        }
    }
}

#[derive(Serialize)]
struct StatusLine<'a> {
    status: &'a ConnectionStatus,
}

/// Render a connectivity change.
pub fn status_line(status: &ConnectionStatus, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&StatusLine { status })?),
        OutputFormat::Text => {
            let detail = match status.phase {
                ConnectionPhase::Reconnecting => {
                    format!(" (attempt {})", status.reconnect_attempts)
                }
                _ => String::new(),
            };
            let error = status
                .last_error
                .as_deref()
                .map(|e| format!(": {e}"))
                .unwrap_or_default();
            Ok(format!("-- {}{detail}{error}", status.phase))
        }
    }
}

/// Print a rendered line to stdout.
pub fn emit(line: &str) {
    println!("{line}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use trellis_core::enums::LogLevel;

    fn record() -> LogRecord {
        LogRecord::new(
            "slog-1",
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap(),
            LogLevel::Warn,
            "disk almost full",
        )
        .with_session("sess-1")
        .with_source("agent")
    }

    #[test]
    fn text_record_line() {
        assert_eq!(
            record_line(&record(), OutputFormat::Text).unwrap(),
            "2026-03-01 12:00:01.000 WARN  session:sess-1 [agent] disk almost full"
        );
    }

    #[test]
    fn task_id_wins_over_session() {
        let line = record_line(&record().with_task("t-9"), OutputFormat::Text).unwrap();
        assert!(line.contains(" task:t-9 [agent] "));
    }

    #[test]
    fn json_record_line_is_single_line() {
        let line = record_line(&record(), OutputFormat::Json).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["id"], "slog-1");
    }

    #[test]
    fn reconnecting_status_line() {
        let status = ConnectionStatus {
            phase: ConnectionPhase::Reconnecting,
            last_error: Some("connection failed: refused".into()),
            reconnect_attempts: 2,
            last_event_time: None,
        };
        assert_eq!(
            status_line(&status, OutputFormat::Text).unwrap(),
            "-- reconnecting (attempt 2): connection failed: refused"
        );
    }

    #[test]
    fn connected_status_line() {
        let status = ConnectionStatus {
            phase: ConnectionPhase::Connected,
            ..ConnectionStatus::default()
        };
        assert_eq!(status_line(&status, OutputFormat::Text).unwrap(), "-- connected");
    }
}
