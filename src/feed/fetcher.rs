use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Errors that can occur while retrieving a feed.
///
/// Every variant is a per-feed condition: the orchestrator records it for
/// that feed and moves on, so nothing here aborts a run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Terminal HTTP response with a non-success status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Redirect chain exceeded the configured hop cap
    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Limits applied to every fetch attempt.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_redirects: u32,
    pub max_body_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 10,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_redirects: config.max_redirects,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Builds the HTTP client used for all fetches in a run.
///
/// Automatic redirect following is disabled: [`fetch_url`] walks redirects
/// itself so the hop count is capped explicitly.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("feedfold/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Retrieves a feed URL as text.
///
/// Follows 3xx responses that carry a `Location` header (relative targets
/// resolve against the current URL) up to `options.max_redirects` hops.
/// Each attempt is bounded by `options.timeout`; the in-flight request is
/// dropped on expiry. Bodies are streamed up to `options.max_body_bytes`
/// and decoded lossily as UTF-8.
///
/// # Errors
///
/// - [`FetchError::Timeout`] - an attempt exceeded the timeout
/// - [`FetchError::Network`] - connection, DNS, or TLS failure
/// - [`FetchError::HttpStatus`] - non-2xx terminal status, including a 3xx
///   with no `Location` to follow
/// - [`FetchError::TooManyRedirects`] - hop cap exhausted
/// - [`FetchError::ResponseTooLarge`] - body over the size limit
pub async fn fetch_url(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<String, FetchError> {
    let mut current = url.to_string();

    // One initial attempt plus up to max_redirects follow-ups
    for _ in 0..=options.max_redirects {
        let response = tokio::time::timeout(options.timeout, client.get(&current).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok());
            match location {
                Some(target) => {
                    current = resolve_location(&current, target);
                    tracing::debug!(status = status.as_u16(), url = %current, "Following redirect");
                    continue;
                }
                // A redirect status with nowhere to go is a terminal error
                None => return Err(FetchError::HttpStatus(status.as_u16())),
            }
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, options.max_body_bytes).await?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    Err(FetchError::TooManyRedirects(options.max_redirects))
}

/// Resolves a `Location` header against the URL that produced it, so
/// relative redirect targets work. An unresolvable base falls back to the
/// raw header value.
fn resolve_location(base: &str, location: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(location)) {
        Ok(resolved) => resolved.into(),
        Err(_) => location.to_string(),
    }
}

/// Reads a response body with a byte cap, streaming so an oversized body is
/// abandoned as soon as the cap is crossed rather than buffered whole.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: trust an honest Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
