//! Response screening and endpoint paths shared by the diff source and the
//! event transport.

use std::time::Duration;

use reqwest::{Response, StatusCode, header};
use trellis_core::enums::LogScope;

use crate::error::SyncError;

pub(crate) const USER_AGENT: &str = concat!("trellis/", env!("CARGO_PKG_VERSION"));

/// Used when a 429 carries no usable `Retry-After`.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

/// Pass 2xx responses through. A 429 becomes [`SyncError::RateLimited`],
/// which the poller and the push driver turn into a longer wait; any other
/// status becomes [`SyncError::Api`] carrying the body.
///
/// # Errors
///
/// See above.
pub async fn check_response(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SyncError::RateLimited {
            retry_after_secs: retry_after(&resp).as_secs(),
        });
    }
    if status.is_success() {
        return Ok(resp);
    }
    Err(SyncError::Api {
        status: status.as_u16(),
        message: resp.text().await.unwrap_or_default(),
    })
}

/// `Retry-After` in delta-seconds form.
fn retry_after(resp: &Response) -> Duration {
    resp.headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .map_or(DEFAULT_BACKOFF, Duration::from_secs)
}

/// Fetch-diff endpoint for a scope.
#[must_use]
pub fn diff_url(base_url: &str, scope: &LogScope) -> String {
    scoped_url(base_url, scope, "logs/diff")
}

/// Event-stream endpoint for a scope.
#[must_use]
pub fn events_url(base_url: &str, scope: &LogScope) -> String {
    scoped_url(base_url, scope, "events")
}

fn scoped_url(base_url: &str, scope: &LogScope, tail: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    match scope {
        LogScope::Global => format!("{base}/api/{tail}"),
        LogScope::Session(id) => {
            format!("{base}/api/sessions/{}/{tail}", urlencoding::encode(id))
        }
    }
}
