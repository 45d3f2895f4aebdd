//! HTTP fetcher implementation
//!
//! This module handles the page request for an extraction, including:
//! - Building HTTP clients with the configured user agent and auth headers
//! - Retry logic for transient failures
//! - Bounded redirect handling
//! - Error classification into [`HarvestError`] variants

use crate::config::FetcherConfig;
use crate::crawler::request::{AuthConfig, BasicAuth};
use crate::HarvestError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// A fetched page with its response metadata
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value, empty when absent
    pub content_type: String,
    /// Final URL after redirects
    pub final_url: String,
    /// Decoded page body
    pub body: String,
    /// Response headers, lowercase names; repeated headers are joined with `, `
    pub headers: BTreeMap<String, String>,
}

/// Builds an HTTP client for one extraction
///
/// Cookies are sent as a single `Cookie` header in name order and custom
/// headers are installed as defaults. Basic credentials are applied per
/// request by [`fetch_page`].
///
/// # Arguments
///
/// * `config` - Fetcher settings (timeouts, redirects, user agent)
/// * `auth` - Cookies and headers for this request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - A header name or value is invalid, or the client failed to build
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::FetcherConfig;
/// use sumi_harvest::crawler::{build_http_client, AuthConfig};
///
/// let client = build_http_client(&FetcherConfig::default(), &AuthConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig, auth: &AuthConfig) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));

    let mut problems = Vec::new();
    for (name, value) in &auth.headers {
        match (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => problems.push(format!("Invalid auth header '{}'", name)),
        }
    }

    if !auth.cookies.is_empty() {
        let cookie = cookie_header(auth);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => problems.push("Cookie values contain invalid characters".to_string()),
        }
    }

    if !problems.is_empty() {
        return Err(HarvestError::InvalidRequest(problems));
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|source| HarvestError::Http {
            url: String::new(),
            source,
        })
}

/// Formats the cookie map as a `Cookie` header value
fn cookie_header(auth: &AuthConfig) -> String {
    auth.cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name.trim(), value.trim()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fetches a page with retry
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return the page |
/// | HTTP 4xx / other non-2xx | Immediate → `HttpStatus` |
/// | HTTP 5xx | Retry up to `max_retries` attempts |
/// | Timeout | Retry up to `max_retries` attempts |
/// | Connection refused | Retry up to `max_retries` attempts |
/// | Body decode failure | Retry up to `max_retries` attempts |
/// | Redirect chain too long | Immediate → `RedirectLimit` |
///
/// The last failure is returned once attempts are exhausted. There is no
/// delay between attempts.
///
/// # Arguments
///
/// * `client` - Client built by [`build_http_client`]
/// * `url` - The URL to fetch
/// * `basic` - Optional HTTP Basic credentials
/// * `max_retries` - Total attempts (at least one is always made)
pub async fn fetch_page(
    client: &Client,
    url: &str,
    basic: Option<&BasicAuth>,
    max_retries: u32,
) -> Result<FetchedPage, HarvestError> {
    let attempts = max_retries.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        tracing::debug!("Fetching {} (attempt {}/{})", url, attempt, attempts);

        match fetch_once(client, url, basic).await {
            Ok(page) => return Ok(page),
            Err(e) if is_retryable(&e) && attempt < attempts => {
                tracing::warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| HarvestError::Timeout {
        url: url.to_string(),
    }))
}

async fn fetch_once(
    client: &Client,
    url: &str,
    basic: Option<&BasicAuth>,
) -> Result<FetchedPage, HarvestError> {
    let mut request = client.get(url);
    if let Some(basic) = basic {
        request = request.basic_auth(&basic.username, Some(&basic.password));
    }

    let response = request
        .send()
        .await
        .map_err(|e| classify_transport_error(url, e))?;

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return Err(HarvestError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            HarvestError::Timeout {
                url: url.to_string(),
            }
        } else {
            HarvestError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    Ok(FetchedPage {
        status_code: status.as_u16(),
        content_type,
        final_url,
        body,
        headers,
    })
}

/// Maps a reqwest send error to a crate error
fn classify_transport_error(url: &str, e: reqwest::Error) -> HarvestError {
    let url = url.to_string();
    if e.is_timeout() {
        HarvestError::Timeout { url }
    } else if e.is_redirect() {
        HarvestError::RedirectLimit { url }
    } else if e.is_connect() {
        HarvestError::Connect { url }
    } else if e.is_decode() || e.is_body() {
        HarvestError::Decode {
            url,
            message: e.to_string(),
        }
    } else {
        HarvestError::Http { url, source: e }
    }
}

/// Returns true if another attempt may succeed
fn is_retryable(error: &HarvestError) -> bool {
    match error {
        HarvestError::Timeout { .. } | HarvestError::Connect { .. } | HarvestError::Decode { .. } => {
            true
        }
        HarvestError::HttpStatus { status, .. } => *status >= 500,
        _ => false,
    }
}
