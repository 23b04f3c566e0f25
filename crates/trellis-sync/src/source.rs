//! The fetch-diff collaborator.

use std::future::Future;

use trellis_config::ServerConfig;
use trellis_core::entities::{DiffQuery, LogDiff};
use trellis_core::enums::LogScope;

use crate::error::SyncError;
use crate::http::{USER_AGENT, check_response, diff_url};
use crate::wire::decode_diff;

/// Answers "what changed since this cursor" for one scope.
pub trait DiffSource: Send + Sync + 'static {
    fn fetch_diff(
        &self,
        query: &DiffQuery,
    ) -> impl Future<Output = Result<LogDiff, SyncError>> + Send;
}

/// [`DiffSource`] backed by the server's diff endpoint.
#[derive(Debug, Clone)]
pub struct HttpDiffSource {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpDiffSource {
    /// # Errors
    ///
    /// Returns [`SyncError::NotConfigured`] without a base URL, or
    /// [`SyncError::Http`] if the client cannot be built.
    pub fn new(server: &ServerConfig, scope: &LogScope) -> Result<Self, SyncError> {
        if !server.is_configured() {
            return Err(SyncError::NotConfigured("server.base_url".into()));
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(server.request_timeout())
            .build()?;
        Ok(Self {
            http,
            url: diff_url(&server.base_url, scope),
            token: server.token().map(str::to_owned),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_url(&self, query: &DiffQuery) -> String {
        let pairs = query.to_query_pairs();
        if pairs.is_empty() {
            return self.url.clone();
        }
        let encoded: Vec<String> = pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        format!("{}?{}", self.url, encoded.join("&"))
    }
}

impl DiffSource for HttpDiffSource {
    async fn fetch_diff(&self, query: &DiffQuery) -> Result<LogDiff, SyncError> {
        let url = self.request_url(query);
        tracing::debug!(%url, "fetching log diff");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = check_response(request.send().await?).await?;
        let body = resp.bytes().await?;
        decode_diff(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use trellis_core::enums::LogLevel;

    fn server() -> ServerConfig {
        ServerConfig {
            base_url: "http://localhost:4000/".into(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn requires_base_url() {
        let err = HttpDiffSource::new(&ServerConfig::default(), &LogScope::Global).unwrap_err();
        assert!(matches!(err, SyncError::NotConfigured(_)));
    }

    #[test]
    fn bare_query_has_no_query_string() {
        let source = HttpDiffSource::new(&server(), &LogScope::Global).unwrap();
        assert_eq!(
            source.request_url(&DiffQuery::default()),
            "http://localhost:4000/api/logs/diff"
        );
    }

    #[test]
    fn query_parameters_are_encoded() {
        let source =
            HttpDiffSource::new(&server(), &LogScope::Session("s 1".into())).unwrap();
        let query = DiffQuery {
            since: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            limit: Some(50),
            level: Some(LogLevel::Warn),
            source: Some("api/gateway".into()),
        };
        assert_eq!(
            source.request_url(&query),
            "http://localhost:4000/api/sessions/s%201/logs/diff\
             ?since=2026-01-01T00%3A00%3A00Z&limit=50&level=warn&source=api%2Fgateway"
        );
    }
}
