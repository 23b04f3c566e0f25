//! Synchronization error types.

use thiserror::Error;

/// Errors raised by the fetch-diff and event-stream collaborators.
///
/// None of these escape the subsystem as a fault: the push channel and poll
/// scheduler turn them into observable status.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the server.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The server returned a 429 Too Many Requests response.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// A diff body or event payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The event stream ended.
    #[error("event stream closed by server")]
    StreamClosed,

    /// A required collaborator setting is missing.
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Config(#[from] trellis_config::ConfigError),
}
