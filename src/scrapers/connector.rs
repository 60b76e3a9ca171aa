//! Page fetching for schedule sources.
//!
//! # Architecture
//!
//! - [`Fetch`]: Core trait, "give me the page for this source"
//! - [`HttpFetcher`]: One bounded HTTP(S) request per call via `reqwest`;
//!   `file://` URLs are read from disk, which is handy for saved pages
//! - [`RetryFetch`]: Decorator that adds backoff retries to any [`Fetch`]
//!
//! A fetch either yields the page body or a typed [`FetchError`]; an
//! unreachable source never looks like an empty page.
//!
//! # Retry Strategy
//!
//! Retries are opt-in (`--retries`, default 0). When enabled:
//! - Only transient failures are retried (transport errors, timeouts, 5xx)
//! - Exponential backoff starting at the base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use std::fmt;
use std::time::{Duration, Instant};

use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::FetchError;
use crate::models::SourceSpec;

/// Fetch the raw page content of a source.
pub trait Fetch {
    async fn fetch(&self, source: &SourceSpec) -> Result<String, FetchError>;
}

/// Fetches pages over HTTP(S) with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a client that presents itself like a desktop browser; several
    /// schedule sites serve a stripped page to unknown agents.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.9"));

        let client = ClientBuilder::new()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: e,
            }
        }
    }

    async fn fetch_file(&self, url: &str, parsed: &Url) -> Result<String, FetchError> {
        let path = parsed.to_file_path().map_err(|_| FetchError::Io {
            url: url.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a local path"),
        })?;
        let read = tokio::fs::read_to_string(&path);
        match tokio::time::timeout(self.timeout, read).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(source)) => Err(FetchError::Io {
                url: url.to_string(),
                source,
            }),
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.id, url = %source.url))]
    async fn fetch(&self, source: &SourceSpec) -> Result<String, FetchError> {
        let url = source.url.as_str();
        let t0 = Instant::now();

        if let Ok(parsed) = Url::parse(url) {
            if parsed.scheme() == "file" {
                return self.fetch_file(url, &parsed).await;
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Source returned non-success status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|e| self.classify(url, e))?;
        info!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Fetched source page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
/// With `max_retries == 0` this is a single pass-through attempt.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: Fetch,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Fetch for RetryFetch<T>
where
    T: Fetch,
{
    #[instrument(level = "debug", skip_all, fields(source = %source.id))]
    async fn fetch(&self, source: &SourceSpec) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(source).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries || !e.is_transient() {
                        if self.max_retries > 0 {
                            error!(
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_total = total_t0.elapsed().as_millis(),
                                error = %e,
                                "fetch() giving up"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                    debug!(attempt, "Retrying fetch");
                }
            }
        }
    }
}
