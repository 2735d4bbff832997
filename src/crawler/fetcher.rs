//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building the HTTP client with the crawler's user agent and timeouts
//! - Classifying failures as transient or permanent
//! - Retrying transient failures with jittered exponential backoff
//! - Driving each task's [`TaskLifecycle`] through its states

use crate::config::{Config, CrawlerConfig};
use crate::crawler::scheduler::Scheduler;
use crate::state::{InvalidTransition, TaskLifecycle};
use crate::url::extract_domain;
use reqwest::{header, redirect::Policy, Client, Response, StatusCode};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upper bound on a single backoff delay
const MAX_BACKOFF_MS: u64 = 30_000;

/// Errors produced while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("server error: HTTP {0}")]
    ServerError(u16),

    #[error("rate limited: HTTP 429")]
    RateLimited,

    #[error("client error: HTTP {0}")]
    ClientError(u16),

    #[error("unexpected status: HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("not an HTML page: {0}")]
    NotHtml(String),

    #[error("page larger than {0} bytes")]
    TooLarge(u64),

    #[error("malformed URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    State(#[from] InvalidTransition),
}

impl FetchError {
    /// Transient failures are retried; everything else settles the task
    ///
    /// | Condition              | Class     |
    /// |------------------------|-----------|
    /// | Timeout                | transient |
    /// | Connection refused/reset | transient |
    /// | HTTP 5xx, HTTP 429     | transient |
    /// | Truncated body         | transient |
    /// | Other HTTP 4xx         | permanent |
    /// | Body over the size cap | permanent |
    /// | DNS failure            | permanent |
    /// | Malformed URL          | permanent |
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect(_) | Self::ServerError(_) | Self::RateLimited | Self::Body(_)
        )
    }

    /// Maps a response status to an error, or None for success
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }
        let code = status.as_u16();
        Some(if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else if status.is_server_error() {
            Self::ServerError(code)
        } else if status.is_client_error() {
            Self::ClientError(code)
        } else {
            Self::UnexpectedStatus(code)
        })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        if e.is_builder() {
            return Self::InvalidUrl(e.to_string());
        }
        if e.is_connect() {
            let detail = error_chain(&e);
            let lower = detail.to_lowercase();
            if lower.contains("dns") || lower.contains("failed to lookup address") {
                return Self::Dns(detail);
            }
            return Self::Connect(detail);
        }
        if e.is_body() || e.is_decode() {
            return Self::Body(e.to_string());
        }
        if e.is_redirect() {
            return Self::Request(e.to_string());
        }
        Self::Request(error_chain(&e))
    }
}

/// Flattens an error and its sources into one line
fn error_chain(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Backoff schedule for transient failures
///
/// Delay for retry `n` (0-based) is `base * 2^n`, capped, plus up to 20%
/// random jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: MAX_BACKOFF_MS,
            jitter_factor: 0.2,
        }
    }

    /// Calculate delay for a given retry (0-indexed)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(retry));
        let capped = exponential.min(self.max_delay_ms);

        let jitter_range = (capped as f64 * self.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            fastrand::u64(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub body: String,
}

/// Builds the HTTP client shared by all workers
///
/// The user agent is `Name/Version (+ContactURL; ContactEmail)`. Redirects
/// are followed (up to 10 hops) and every request carries the configured
/// timeout.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.crawler.request_timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A response body read under a byte ceiling
#[derive(Debug, Default)]
pub struct CappedBody {
    /// Bytes received; may run one chunk past the ceiling when truncated
    pub bytes: Vec<u8>,
    /// Reading stopped because the ceiling was crossed
    pub truncated: bool,
}

impl CappedBody {
    /// Received bytes cut to `limit`
    pub fn prefix(&self, limit: u64) -> &[u8] {
        let end = self.bytes.len().min(usize::try_from(limit).unwrap_or(usize::MAX));
        &self.bytes[..end]
    }
}

/// Streams a response body, stopping once more than `limit` bytes arrived
pub async fn read_body(mut response: Response, limit: u64) -> Result<CappedBody, reqwest::Error> {
    let mut body = CappedBody::default();
    while let Some(chunk) = response.chunk().await? {
        body.bytes.extend_from_slice(&chunk);
        if body.bytes.len() as u64 > limit {
            body.truncated = true;
            break;
        }
    }
    Ok(body)
}

/// Issues one GET for an HTML page, reading at most `max_bytes` of body
pub async fn fetch_page(client: &Client, url: &Url, max_bytes: u64) -> Result<FetchedPage, FetchError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if let Some(error) = FetchError::from_status(status) {
        return Err(error);
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !content_type.is_empty() && !is_markup(&content_type) {
        return Err(FetchError::NotHtml(content_type));
    }
    if response.content_length().is_some_and(|declared| declared > max_bytes) {
        return Err(FetchError::TooLarge(max_bytes));
    }

    let final_url = response.url().clone();
    let body = read_body(response, max_bytes).await?;
    if body.truncated {
        return Err(FetchError::TooLarge(max_bytes));
    }

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        body: String::from_utf8_lossy(&body.bytes).into_owned(),
    })
}

fn is_markup(content_type: &str) -> bool {
    content_type.contains("html") || content_type.starts_with("text/") || content_type.contains("xml")
}

/// Page fetcher with politeness and retries
///
/// Every attempt, retries included, waits for the target domain's politeness
/// slot and a free worker before going to the network.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    scheduler: Arc<Scheduler>,
    policy: RetryPolicy,
    max_page_bytes: u64,
}

impl Fetcher {
    pub fn new(client: Client, scheduler: Arc<Scheduler>, config: &CrawlerConfig) -> Self {
        Self {
            client,
            scheduler,
            policy: RetryPolicy::from_config(config),
            max_page_bytes: config.max_page_bytes,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// The lifecycle must be `Pending`; on return it is `Succeeded` or
    /// `Failed`. Cancellation during a request or a backoff returns
    /// [`FetchError::Cancelled`] without further attempts.
    pub async fn fetch(
        &self,
        url: &Url,
        lifecycle: &mut TaskLifecycle,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage, FetchError> {
        let domain = extract_domain(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = self.scheduler.acquire_request(&domain) => permit,
            };
            let Some(permit) = permit else {
                lifecycle.skip()?;
                return Err(FetchError::Cancelled);
            };

            lifecycle.start_attempt()?;
            tracing::debug!("GET {} (attempt {})", url, lifecycle.attempts());
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = fetch_page(&self.client, url, self.max_page_bytes) => result,
            };
            drop(permit);

            match attempt {
                Ok(page) => {
                    lifecycle.succeed()?;
                    return Ok(page);
                }
                Err(FetchError::Cancelled) => {
                    lifecycle.skip()?;
                    return Err(FetchError::Cancelled);
                }
                Err(e) if e.is_transient() && lifecycle.attempts() <= self.policy.max_retries => {
                    let delay = self.policy.calculate_delay(lifecycle.attempts() - 1);
                    lifecycle.schedule_retry(delay)?;
                    tracing::debug!(
                        "Transient failure for {}: {}; retrying in {:?}",
                        url,
                        e,
                        delay
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            lifecycle.skip()?;
                            return Err(FetchError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    lifecycle.fail()?;
                    tracing::debug!(
                        "Giving up on {} after {} attempt(s): {}",
                        url,
                        lifecycle.attempts(),
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}
