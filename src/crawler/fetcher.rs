//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with a browser-like header set
//! - The optional, explicitly configured TLS verification bypass
//! - GET requests with per-call timeouts
//! - The single https -> http protocol fallback
//! - Size guards for large downloads
//! - Error classification

use crate::config::HttpConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::{redirect::Policy, Client};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Result of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code (always 2xx)
    pub status_code: u16,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// Effective URL after redirects and protocol fallback
    pub final_url: Url,
    /// Wall time spent on the successful attempt
    pub elapsed: Duration,
}

impl FetchResult {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Why a fetch failed; always carries the final attempted URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("{url} is too large ({size} bytes, limit {limit})")]
    TooLarge { url: String, size: u64, limit: u64 },

    #[error("Failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// The last URL that was attempted
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Network { url, .. }
            | Self::Status { url, .. }
            | Self::TooLarge { url, .. }
            | Self::Body { url, .. } => url,
        }
    }

    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::TooLarge { .. })
    }
}

/// Builds the HTTP client shared by every fetch of a run
///
/// # Trust decision
///
/// When `accept_invalid_certs` is set, certificate validation is disabled.
/// With the rustls backend this also skips hostname verification, so
/// self-signed, expired and hostname-mismatched certificates are all
/// accepted. This exists for one known target whose TLS setup is broken and
/// must never be enabled for arbitrary sites; it is logged at warn level
/// every time a client is built with it.
///
/// # Example
///
/// ```no_run
/// use site_harvest::config::HttpConfig;
/// use site_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid header {}: {}", name, value),
        }
    }

    if config.accept_invalid_certs {
        tracing::warn!(
            "TLS certificate and hostname verification DISABLED (accept-invalid-certs = true); \
             only use this for the configured target"
        );
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .redirect(Policy::limited(10))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
}

/// Fetches a URL, falling back from https to http once on failure
///
/// # Request Flow
///
/// 1. GET `url` with the given timeout
/// 2. On any failure of an `https://` URL, GET the identical path over
///    `http://` with the same timeout
/// 3. Surface the last error if both fail
///
/// | Condition | Action |
/// |-----------|--------|
/// | Non-2xx status | Fallback, then `Status` |
/// | Timeout | Fallback, then `Timeout` |
/// | Connection / TLS error | Fallback, then `Network` |
///
/// Nothing is retried beyond the single protocol fallback.
pub async fn fetch_url(client: &Client, url: &str, timeout: Duration) -> Result<FetchResult, FetchError> {
    fetch_with_fallback(client, url, timeout, None).await
}

/// Like [`fetch_url`] but refuses bodies larger than `max_bytes`
///
/// An advertised `content-length` above the cap aborts before any of the body
/// is read. Without one, the body is read in chunks and abandoned as soon as
/// it passes the cap. A `TooLarge` result is final and skips the fallback.
pub async fn fetch_limited(
    client: &Client,
    url: &str,
    timeout: Duration,
    max_bytes: u64,
) -> Result<FetchResult, FetchError> {
    fetch_with_fallback(client, url, timeout, Some(max_bytes)).await
}

async fn fetch_with_fallback(
    client: &Client,
    url: &str,
    timeout: Duration,
    max_bytes: Option<u64>,
) -> Result<FetchResult, FetchError> {
    match fetch_once(client, url, timeout, max_bytes).await {
        Ok(result) => Ok(result),
        Err(e) if e.is_too_large() => Err(e),
        Err(e) => match http_fallback_url(url) {
            Some(http_url) => {
                tracing::info!("HTTPS failed for {} ({}), trying {}", url, e, http_url);
                fetch_once(client, &http_url, timeout, max_bytes).await
            }
            None => Err(e),
        },
    }
}

/// Performs a single GET with no fallback
pub async fn fetch_once(
    client: &Client,
    url: &str,
    timeout: Duration,
    max_bytes: Option<u64>,
) -> Result<FetchResult, FetchError> {
    let started = Instant::now();

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(limit) = max_bytes {
        if let Some(size) = advertised_length(response.headers()) {
            if size > limit {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    size,
                    limit,
                });
            }
        }
    }

    let final_url = response.url().clone();
    let body = match max_bytes {
        Some(limit) => read_capped(response, url, limit).await?,
        None => response
            .bytes()
            .await
            .map_err(|e| classify_body_error(url, e))?
            .to_vec(),
    };

    Ok(FetchResult {
        status_code: status.as_u16(),
        body,
        final_url,
        elapsed: started.elapsed(),
    })
}

/// Reads a response body chunk by chunk, giving up once it passes `limit`
async fn read_capped(
    mut response: reqwest::Response,
    url: &str,
    limit: u64,
) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| classify_body_error(url, e))?
    {
        body.extend_from_slice(&chunk);
        if body.len() as u64 > limit {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                size: body.len() as u64,
                limit,
            });
        }
    }

    Ok(body)
}

/// Parses the advertised `content-length` header
pub fn advertised_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Returns the `http://` form of an `https://` URL, or `None` for anything else
pub fn http_fallback_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    parsed.set_scheme("http").ok()?;
    Some(parsed.to_string())
}

fn classify_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: e,
        }
    }
}

fn classify_body_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Body {
            url: url.to_string(),
            source: e,
        }
    }
}
