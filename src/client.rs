//! HTTP client for the OpenSky Network REST API.

use crate::protocol::{self, ParseError};
use crate::types::{BoundingBox, FlightHistoryEntry, StateVector};
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, ClientBuilder, Response, StatusCode,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Length of the trailing history window.
pub const HISTORY_WINDOW: Duration = Duration::from_secs(86_400);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server returned error status: {status}")]
    Status { status: StatusCode },
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Authentication failed")]
    AuthError,
    #[error("Malformed response: {0}")]
    Parse(#[from] ParseError),
}

impl ClientError {
    /// Server supplied wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Account used for basic auth. Never mutated after construction.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the OpenSky client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    /// Per-request timeout
    pub timeout: Duration,
    /// Scheme and host, without a trailing slash
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout: Duration::from_secs(30),
            base_url: "https://opensky-network.org".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Unix-second bounds of a history lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub begin: i64,
    pub end: i64,
}

impl HistoryWindow {
    /// The trailing 24 hours ending at `now`.
    pub fn trailing(now: DateTime<Utc>) -> Self {
        let end = now.timestamp();
        Self {
            begin: end - HISTORY_WINDOW.as_secs() as i64,
            end,
        }
    }

    pub fn now() -> Self {
        Self::trailing(Utc::now())
    }
}

/// Issues bounding-box state queries.
pub trait StateFetcher: Send + Sync {
    /// Fetch every state vector inside `bbox`. An empty vector means no traffic.
    fn fetch_states(
        &self,
        bbox: BoundingBox,
    ) -> impl Future<Output = Result<Vec<StateVector>, ClientError>> + Send;
}

/// Looks up the most recent flight of one aircraft.
pub trait HistoryEnricher: Send + Sync {
    /// `Ok(None)` when the service has no usable history for the aircraft.
    /// `Err` only for transport failures worth retrying.
    fn fetch_history(
        &self,
        icao24: &str,
    ) -> impl Future<Output = Result<Option<FlightHistoryEntry>, ClientError>> + Send;
}

impl<T: StateFetcher> StateFetcher for Arc<T> {
    fn fetch_states(
        &self,
        bbox: BoundingBox,
    ) -> impl Future<Output = Result<Vec<StateVector>, ClientError>> + Send {
        (**self).fetch_states(bbox)
    }
}

impl<T: HistoryEnricher> HistoryEnricher for Arc<T> {
    fn fetch_history(
        &self,
        icao24: &str,
    ) -> impl Future<Output = Result<Option<FlightHistoryEntry>, ClientError>> + Send {
        (**self).fetch_history(icao24)
    }
}

/// Client for the OpenSky state and flight endpoints.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct OpenSkyClient {
    client: Client,
    config: ClientConfig,
}

impl OpenSkyClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Self::builder(&config).build()?;
        Ok(Self { client, config })
    }

    fn builder(config: &ClientConfig) -> ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Client::builder()
            .default_headers(headers)
            .user_agent(concat!("flightwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn states_url(&self, bbox: &BoundingBox) -> String {
        format!(
            "{}/api/states/all?{}&extended=1",
            self.config.base_url,
            bbox.to_query_string()
        )
    }

    fn history_url(&self, icao24: &str, window: HistoryWindow) -> String {
        format!(
            "{}/api/flights/aircraft?icao24={}&begin={}&end={}",
            self.config.base_url, icao24, window.begin, window.end
        )
    }

    async fn get(&self, url: &str) -> Result<Response, ClientError> {
        tracing::debug!("Fetching: {}", url);

        let credentials = &self.config.credentials;
        let response = self
            .client
            .get(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;

        Ok(response)
    }
}

/// Map a non-success response to its error.
fn status_error(response: &Response) -> ClientError {
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = ["x-rate-limit-retry-after-seconds", "retry-after"]
                .iter()
                .find_map(|name| response.headers().get(*name))
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);

            ClientError::RateLimited { retry_after }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::AuthError,
        status => ClientError::Status { status },
    }
}

impl StateFetcher for OpenSkyClient {
    async fn fetch_states(&self, bbox: BoundingBox) -> Result<Vec<StateVector>, ClientError> {
        let response = self.get(&self.states_url(&bbox)).await?;

        if !response.status().is_success() {
            return Err(status_error(&response));
        }

        let body = response.bytes().await?;
        Ok(protocol::parse_states(&body)?)
    }
}

impl HistoryEnricher for OpenSkyClient {
    async fn fetch_history(&self, icao24: &str) -> Result<Option<FlightHistoryEntry>, ClientError> {
        let url = self.history_url(icao24, HistoryWindow::now());
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            tracing::debug!(
                "No history for {}: {}",
                icao24,
                status_error(&response)
            );
            return Ok(None);
        }

        let body = response.bytes().await?;
        match protocol::parse_flights(&body) {
            Ok(entry) => Ok(entry),
            Err(e) => {
                tracing::debug!("Discarding history for {}: {}", icao24, e);
                Ok(None)
            }
        }
    }
}
