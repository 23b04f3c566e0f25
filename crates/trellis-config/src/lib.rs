//! # trellis-config
//!
//! Layered configuration loading for Trellis using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TRELLIS_*` prefix, `__` as separator)
//! 2. Project-level `.trellis/config.toml`
//! 3. User-level `~/.config/trellis/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `TRELLIS_SERVER__BASE_URL` -> `server.base_url`,
//! `TRELLIS_CACHE__MAX_ENTRIES` -> `cache.max_entries`, etc.
//! The `__` (double underscore) separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use trellis_config::TrellisConfig;
//!
//! let config = TrellisConfig::load_with_dotenv().expect("config");
//!
//! if config.server.is_configured() {
//!     println!("API: {}", config.server.base_url);
//! }
//! ```

mod cache;
mod error;
mod server;
mod stream;
mod sync;

pub use cache::CacheConfig;
pub use error::ConfigError;
pub use server::ServerConfig;
pub use stream::StreamConfig;
pub use sync::SyncConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrellisConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

impl TrellisConfig {
    /// Load configuration from all sources (TOML files + environment variables)
    /// and validate it.
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need
    /// `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".trellis/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("TRELLIS_").split("__"))
    }

    /// Reject values that would stall timers or empty the cache on every pass.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.cache.max_entries == 0 {
            return invalid("cache.max_entries", "must be greater than zero");
        }
        if self.cache.retain_period_ms == 0 {
            return invalid("cache.retain_period_ms", "must be greater than zero");
        }
        if self.cache.auto_optimize && self.cache.optimize_interval_ms == 0 {
            return invalid("cache.optimize_interval_ms", "must be greater than zero");
        }
        if self.sync.poll_interval_ms == 0 {
            return invalid("sync.poll_interval_ms", "must be greater than zero");
        }
        if self.sync.global_poll_interval_ms == 0 {
            return invalid("sync.global_poll_interval_ms", "must be greater than zero");
        }
        if self.sync.poll_limit == Some(0) {
            return invalid("sync.poll_limit", "must be greater than zero when set");
        }
        if self.stream.reconnect_interval_ms == 0 {
            return invalid("stream.reconnect_interval_ms", "must be greater than zero");
        }
        Ok(())
    }

    /// Error unless the server section has a base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] for the `server` section.
    pub fn require_server(&self) -> Result<&ServerConfig, ConfigError> {
        if self.server.is_configured() {
            Ok(&self.server)
        } else {
            Err(ConfigError::NotConfigured {
                section: "server".into(),
            })
        }
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("trellis").join("config.toml"))
    }

    /// Load `.env` from the workspace root.
    ///
    /// Walks up from `CARGO_MANIFEST_DIR` (if available) looking for a `.env`
    /// file, then falls back to the current directory. Silently does nothing
    /// if no `.env` is found.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}
