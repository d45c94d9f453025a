//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Manual redirect handling, so every hop can be recorded
//! - Error classification
//!
//! Nothing here is retried. A failed request is reported once and the caller
//! records it as a completed result.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::storage::{NetworkErrorKind, NetworkFailure, RedirectHop};
use reqwest::{header, redirect::Policy, Client, Response};
use std::collections::HashSet;
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// A terminal HTTP response arrived (any status code)
    Response {
        /// URL that produced this response
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: Option<String>,
        /// Raw response body
        body: Vec<u8>,
        /// Redirects followed to get here, in order
        hops: Vec<RedirectHop>,
    },

    /// No response arrived (connection refused, timeout, broken body, etc.)
    NetworkError {
        failure: NetworkFailure,
        /// Redirects followed before the failure
        hops: Vec<RedirectHop>,
    },
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; `fetch_url` follows them itself.
/// Timeouts are applied only when configured.
///
/// # Example
///
/// ```no_run
/// use page_mapper::config::Config;
/// use page_mapper::crawler::build_http_client;
///
/// let config = Config::default();
/// let client = build_http_client(&config.crawler, &config.user_agent).unwrap();
/// ```
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent.header_value())
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = crawler.request_timeout() {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = crawler.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }

    builder.build()
}

/// Fetches a URL, following up to `max_redirects` redirects
///
/// # Request Flow
///
/// 1. Send GET request
/// 2. On a 3xx with a usable `Location`, record the hop and request the target
/// 3. Stop following when the budget is spent or a URL repeats; the last
///    3xx response is then returned as the terminal response
/// 4. Read the body of the terminal response
///
/// | Condition | Result |
/// |-----------|--------|
/// | Any HTTP status | `Response` |
/// | Redirect loop / chain too long | `Response` with the 3xx status |
/// | Timeout | `NetworkError` (Timeout) |
/// | DNS / connection refused / TLS | `NetworkError` (Connect) |
/// | Body read failure | `NetworkError` (Body) |
pub async fn fetch_url(client: &Client, url: &Url, max_redirects: u32) -> FetchResult {
    let mut hops: Vec<RedirectHop> = Vec::new();
    let mut visited: HashSet<Url> = HashSet::new();
    let mut current = url.clone();
    visited.insert(current.clone());

    loop {
        tracing::trace!("GET {}", current);

        let response = match client.get(current.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchResult::NetworkError {
                    failure: classify_error(&e),
                    hops,
                }
            }
        };

        let status_code = response.status().as_u16();

        if response.status().is_redirection() {
            if let Some(next) = redirect_target(&response, &current) {
                if visited.contains(&next) {
                    tracing::debug!("Redirect loop at {} -> {}", current, next);
                } else if hops.len() >= max_redirects as usize {
                    tracing::debug!(
                        "Redirect limit ({}) reached at {}",
                        max_redirects,
                        current
                    );
                } else {
                    hops.push(RedirectHop {
                        from: current.clone(),
                        to: next.clone(),
                        status_code,
                    });
                    visited.insert(next.clone());
                    current = next;
                    continue;
                }
            }
        }

        return read_response(response, current, status_code, hops).await;
    }
}

async fn read_response(
    response: Response,
    final_url: Url,
    status_code: u16,
    hops: Vec<RedirectHop>,
) -> FetchResult {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match response.bytes().await {
        Ok(body) => FetchResult::Response {
            final_url,
            status_code,
            content_type,
            body: body.to_vec(),
            hops,
        },
        Err(e) => {
            let mut failure = classify_error(&e);
            if failure.kind == NetworkErrorKind::Other {
                failure.kind = NetworkErrorKind::Body;
            }
            FetchResult::NetworkError { failure, hops }
        }
    }
}

/// The absolute HTTP(S) target of a redirect response, if it has one
fn redirect_target(response: &Response, current: &Url) -> Option<Url> {
    let location = response
        .headers()
        .get(header::LOCATION)?
        .to_str()
        .ok()?
        .trim();

    let target = current.join(location).ok()?;
    match target.scheme() {
        "http" | "https" => Some(target),
        _ => None,
    }
}

/// Maps a reqwest error to the kind of network failure it represents
fn classify_error(e: &reqwest::Error) -> NetworkFailure {
    let kind = if e.is_timeout() {
        NetworkErrorKind::Timeout
    } else if e.is_connect() {
        NetworkErrorKind::Connect
    } else if e.is_body() || e.is_decode() {
        NetworkErrorKind::Body
    } else {
        NetworkErrorKind::Other
    };

    NetworkFailure {
        kind,
        message: e.to_string(),
    }
}
