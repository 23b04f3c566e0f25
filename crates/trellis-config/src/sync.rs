//! Poll channel configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const fn default_poll_interval_ms() -> u64 {
    5_000
}

const fn default_global_poll_interval_ms() -> u64 {
    10_000
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Poll cadence for a single-session view.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Poll cadence for the all-sessions view.
    #[serde(default = "default_global_poll_interval_ms")]
    pub global_poll_interval_ms: u64,

    /// Result limit passed with every fetch-diff query.
    #[serde(default)]
    pub poll_limit: Option<u32>,

    /// Gates the pull channel.
    #[serde(default = "default_true")]
    pub enable_log_polling: bool,

    /// Gates the all-sessions cache: when off, a global view forwards push
    /// events to observers but neither polls nor caches records.
    #[serde(default = "default_true")]
    pub enable_global_log_cache: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            global_poll_interval_ms: default_global_poll_interval_ms(),
            poll_limit: None,
            enable_log_polling: true,
            enable_global_log_cache: true,
        }
    }
}

impl SyncConfig {
    /// Cadence for the given view.
    #[must_use]
    pub const fn poll_interval(&self, global: bool) -> Duration {
        if global {
            Duration::from_millis(self.global_poll_interval_ms)
        } else {
            Duration::from_millis(self.poll_interval_ms)
        }
    }
}
