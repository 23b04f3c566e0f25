//! Remote API server configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout in seconds.
const fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Base URL of the management API (e.g., `https://console.example.com`).
    #[serde(default)]
    pub base_url: String,

    /// Bearer token sent with fetch-diff and event-stream requests.
    /// Token acquisition happens elsewhere; this is only the carrier.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Refuse to open the event stream without `api_token`.
    #[serde(default)]
    pub require_auth: bool,

    /// Timeout for fetch-diff requests. The event stream uses it as the
    /// connect timeout only, since the stream itself is long-lived.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: None,
            require_auth: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Returns `true` if a base URL is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    /// The token, if set and non-blank.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_configured() {
        let config = ServerConfig::default();
        assert!(!config.is_configured());
        assert!(config.token().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn blank_token_is_absent() {
        let config = ServerConfig {
            api_token: Some("   ".into()),
            ..ServerConfig::default()
        };
        assert!(config.token().is_none());
    }
}
