use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

/// Client identity sent with every request.
pub const USER_AGENT: &str = concat!(
    "feedscout/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/feedscout/feedscout)"
);

/// Prefer feed media types over generic content.
pub const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9, \
     text/xml;q=0.8, text/html;q=0.7, */*;q=0.5";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a URL.
///
/// Callers of the validator and discoverer never see these: every variant
/// collapses to "unavailable". The ingestion pipeline logs them per feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }

    /// Whether a retry could plausibly succeed.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::HttpStatus(status) => *status == 429 || *status >= 500,
            FetchError::IncompleteResponse { .. } => true,
            _ => false,
        }
    }
}

/// Fetcher tuning. `Default` matches the documented behavior: 15 second
/// timeout, 10MB body cap, no retries.
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_body_bytes: usize,
    /// Extra attempts after a 429, 5xx or truncated body (0 = fail at once)
    pub max_retries: u32,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: MAX_FEED_SIZE,
            max_retries: 0,
        }
    }
}

impl From<&Config> for FetcherSettings {
    fn from(config: &Config) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_body_bytes: config.max_body_bytes,
            max_retries: config.max_retries,
        }
    }
}

/// Bounded-timeout HTTP GETs with feed-friendly headers.
///
/// Cloning is cheap: the underlying `reqwest::Client` is reference counted and
/// shares its connection pool across clones.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    settings: FetcherSettings,
}

impl Fetcher {
    /// Builds a fetcher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the TLS backend or resolver cannot
    /// be initialised.
    pub fn new(settings: FetcherSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self { client, settings })
    }

    /// Fetches a URL and returns the raw body, never charset-decoded.
    ///
    /// This is the entry point for feed bodies: decoding is left to the XML
    /// parser so a prolog-declared encoding wins.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Connection or TLS errors
    /// - [`FetchError::Timeout`] - Request exceeded the timeout
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
    /// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let attempt = match self.get(url).await {
                Ok(response) => read_limited_bytes(response, self.settings.max_body_bytes).await,
                Err(e) => Err(e),
            };

            match attempt {
                Err(e) if e.is_retryable() && retry_count < self.settings.max_retries => {
                    self.backoff(url, &e, retry_count).await;
                    retry_count += 1;
                }
                other => return other,
            }
        }
    }

    /// Fetches a URL and decodes the body using the response's charset.
    ///
    /// Used only for HTML pages inspected during discovery.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let mut retry_count = 0;

        let response = loop {
            match self.get(url).await {
                Err(e) if e.is_retryable() && retry_count < self.settings.max_retries => {
                    self.backoff(url, &e, retry_count).await;
                    retry_count += 1;
                }
                other => break other?,
            }
        };

        if let Some(len) = response.content_length() {
            if len > self.settings.max_body_bytes as u64 {
                return Err(FetchError::ResponseTooLarge);
            }
        }

        response.text().await.map_err(FetchError::from_reqwest)
    }

    /// Sends a GET and rejects non-2xx statuses.
    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        Ok(response)
    }

    async fn backoff(&self, url: &str, error: &FetchError, retry_count: u32) {
        let delay_secs = 2u64.pow(retry_count); // 1s, 2s, 4s
        tracing::warn!(
            url = %url,
            error = %error,
            retry = retry_count,
            delay_secs = delay_secs,
            "Fetch failed, retrying after delay"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::from_reqwest)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
