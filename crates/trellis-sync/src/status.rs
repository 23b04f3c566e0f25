//! Push connection state machine.
//!
//! ```text
//! Disconnected ─connect─▶ Connecting ─open─▶ Connected
//!       ▲                     │                  │ error / close
//!       │                     └──── failure ─────┤
//!   disconnect                                   ▼
//!       │                        attempts < max: Reconnecting ─▶ Connecting
//!       └──────────────────────  attempts = max: Failed (until reconnect())
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one push channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub phase: ConnectionPhase,
    pub last_error: Option<String>,
    /// Consecutive failures since the last successful open.
    pub reconnect_attempts: u32,
    /// Updated on every successfully parsed event.
    pub last_event_time: Option<DateTime<Utc>>,
}

/// What the driver does after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconnectDecision {
    Retry { attempt: u32 },
    GiveUp,
}

impl ConnectionStatus {
    #[must_use]
    pub fn connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.phase == ConnectionPhase::Failed
    }

    pub(crate) fn begin_connect(&mut self) {
        self.phase = ConnectionPhase::Connecting;
    }

    pub(crate) fn mark_open(&mut self) {
        self.phase = ConnectionPhase::Connected;
        self.last_error = None;
        self.reconnect_attempts = 0;
    }

    pub(crate) fn record_event(&mut self, now: DateTime<Utc>) {
        self.last_event_time = Some(now);
    }

    /// Count a transport failure against `max_attempts`.
    pub(crate) fn record_failure(&mut self, error: &str, max_attempts: u32) -> ReconnectDecision {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        if self.reconnect_attempts >= max_attempts {
            self.phase = ConnectionPhase::Failed;
            self.last_error = Some(format!(
                "connection failed after {} attempts: {error}",
                self.reconnect_attempts
            ));
            ReconnectDecision::GiveUp
        } else {
            self.phase = ConnectionPhase::Reconnecting;
            self.last_error = Some(format!("connection failed: {error}"));
            ReconnectDecision::Retry {
                attempt: self.reconnect_attempts,
            }
        }
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.phase = ConnectionPhase::Disconnected;
        self.last_error = None;
    }

    pub(crate) fn reset_attempts(&mut self) {
        self.reconnect_attempts = 0;
    }
}
