//! Bounded log cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const fn default_max_entries() -> usize {
    2000
}

/// 24 hours.
const fn default_retain_period_ms() -> u64 {
    24 * 60 * 60 * 1000
}

const fn default_auto_optimize() -> bool {
    true
}

/// 10 minutes.
const fn default_optimize_interval_ms() -> u64 {
    10 * 60 * 1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Count bound enforced by each optimize pass.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Age bound enforced by each optimize pass, in milliseconds.
    #[serde(default = "default_retain_period_ms")]
    pub retain_period_ms: u64,

    /// Run optimize on a recurring timer.
    #[serde(default = "default_auto_optimize")]
    pub auto_optimize: bool,

    #[serde(default = "default_optimize_interval_ms")]
    pub optimize_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            retain_period_ms: default_retain_period_ms(),
            auto_optimize: default_auto_optimize(),
            optimize_interval_ms: default_optimize_interval_ms(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn retain_period(&self) -> Duration {
        Duration::from_millis(self.retain_period_ms)
    }

    #[must_use]
    pub const fn optimize_interval(&self) -> Duration {
        Duration::from_millis(self.optimize_interval_ms)
    }
}
