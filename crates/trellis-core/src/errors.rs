//! Cross-cutting error types for Trellis.
//!
//! Domain-specific errors (`ConfigError`, `SyncError`) are defined in their
//! respective crates. Cache operations are infallible and have no error type.

use thiserror::Error;

/// Errors that can be raised by any Trellis crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record payload could not be decoded into a [`LogRecord`](crate::entities::LogRecord).
    #[error("Malformed log record {}: {reason}", .id.as_deref().unwrap_or("<unknown id>"))]
    MalformedRecord { id: Option<String>, reason: String },

    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),
}
