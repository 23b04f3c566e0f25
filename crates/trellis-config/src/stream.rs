//! Push channel (event stream) configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const fn default_max_reconnect_attempts() -> u32 {
    5
}

const fn default_reconnect_interval_ms() -> u64 {
    3_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Consecutive transport failures tolerated before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnect attempts (no backoff).
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}
