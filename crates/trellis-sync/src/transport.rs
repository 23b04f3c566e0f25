//! The event-stream collaborator.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::SyncError;
use crate::http::{USER_AGENT, check_response};
use crate::sse::{SseFrame, decode_frames};

/// Frames from one open connection. The stream ending means the server
/// closed the connection; an `Err` item is a transport failure.
pub type EventStream = BoxStream<'static, Result<SseFrame, SyncError>>;

/// Opens a long-lived event stream.
pub trait EventTransport: Send + Sync + 'static {
    fn open(
        &self,
        url: &str,
        auth_token: Option<&str>,
    ) -> impl Future<Output = Result<EventStream, SyncError>> + Send;
}

/// [`EventTransport`] over HTTP `text/event-stream`.
#[derive(Debug, Clone)]
pub struct HttpEventTransport {
    http: reqwest::Client,
}

impl HttpEventTransport {
    /// Only the connect phase is bounded; an open stream may stay idle
    /// indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the client cannot be built.
    pub fn new(connect_timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { http })
    }
}

impl EventTransport for HttpEventTransport {
    async fn open(&self, url: &str, auth_token: Option<&str>) -> Result<EventStream, SyncError> {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache");
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let resp = check_response(request.send().await?).await?;
        tracing::debug!(%url, status = resp.status().as_u16(), "event stream open");
        Ok(decode_frames(Box::pin(resp.bytes_stream())).boxed())
    }
}
