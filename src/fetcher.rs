//! Page fetching for the Article Search API, with exponential backoff retry.
//!
//! The batch source only knows the [`PageFetcher`] capability: give it a page
//! index, get back the raw JSON payload or a [`FetchError`].
//!
//! # Architecture
//!
//! - [`PageFetcher`]: core trait, one async call per page
//! - [`HttpPageFetcher`]: `reqwest` implementation against the live API
//! - [`RetryFetch`]: decorator that retries transient failures of any
//!   `PageFetcher`
//!
//! # Retry Strategy
//!
//! - Only errors where [`FetchError::is_transient`] holds are retried
//! - Exponential backoff starting at `base_delay`
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms by default) added to each delay

use crate::error::FetchError;
use crate::models::PageIndex;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use serde_json::Value;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Default Article Search endpoint.
pub const ARTICLE_SEARCH_URL: &str = "https://api.nytimes.com/svc/search/v2/articlesearch.json";

/// Trait for retrieving one page of raw search results.
///
/// Implementations own transport concerns (timeouts, retries, auth); callers
/// only see a payload or an error.
///
/// Batches are produced on a single task, one page at a time, so the
/// returned future carries no `Send` bound.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Fetch the raw payload for `page`.
    ///
    /// # Arguments
    ///
    /// * `page` - Zero-based page index
    ///
    /// # Returns
    ///
    /// The decoded JSON body, or the error that prevented retrieving it.
    async fn fetch_page(&self, page: PageIndex) -> Result<Value, FetchError>;
}

/// Fetches Article Search pages over HTTPS.
///
/// Each page is requested as
/// `{base_url}?q={query}&api-key={api_key}&page={page}`.
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    base_url: Url,
    query: String,
    api_key: String,
}

impl HttpPageFetcher {
    /// Create a fetcher for `query` against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        query: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            query: query.into(),
            api_key: api_key.into(),
        })
    }

    /// Use a preconfigured client (proxy, timeouts, ...).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build the request URL for `page`, keeping any query string already on
    /// the base URL.
    pub fn page_url(&self, page: PageIndex) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("q", &self.query)
            .append_pair("api-key", &self.api_key)
            .append_pair("page", &page.to_string());
        url
    }
}

impl fmt::Debug for HttpPageFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // api_key stays out of logs
        f.debug_struct("HttpPageFetcher")
            .field("base_url", &self.base_url.as_str())
            .field("query", &self.query)
            .finish()
    }
}

impl PageFetcher for HttpPageFetcher {
    #[instrument(level = "info", skip_all, fields(page = page))]
    async fn fetch_page(&self, page: PageIndex) -> Result<Value, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(self.page_url(page)).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                elapsed_ms = t0.elapsed().as_millis(),
                status = status.as_u16(),
                "Article Search returned non-success status"
            );
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let dt = t0.elapsed();
        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => {
                debug!(elapsed_ms = dt.as_millis(), bytes = body.len(), "Fetched page");
                Ok(payload)
            }
            Err(source) => {
                warn!(
                    elapsed_ms = dt.as_millis(),
                    error = %source,
                    body_preview = %truncate_for_log(&body, 300),
                    "Article Search returned a body that is not JSON"
                );
                Err(FetchError::Decode { page, source })
            }
        }
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`PageFetcher`].
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
pub struct RetryFetch<T> {
    /// The underlying fetcher.
    inner: T,
    /// Extra attempts allowed after the first failure.
    max_retries: usize,
    /// Initial delay between attempts (doubles with each attempt).
    base_delay: StdDuration,
    /// Cap applied before jitter.
    max_delay: StdDuration,
    /// Upper bound of the random jitter added to each delay.
    max_jitter: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    /// Wrap `inner` with up to `max_retries` extra attempts per page.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let http = HttpPageFetcher::new(ARTICLE_SEARCH_URL, "Silicon Valley", key)?;
    /// let fetcher = RetryFetch::new(http, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter: StdDuration::from_millis(250),
        }
    }

    pub fn with_max_jitter(mut self, max_jitter: StdDuration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("inner", &self.inner)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "info", skip_all, fields(page = page))]
    async fn fetch_page(&self, page: PageIndex) -> Result<Value, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch_page(page).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        error!(attempt, error = %e, "fetch_page() failed permanently");
                        return Err(e);
                    }

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "fetch_page() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "fetch_page() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
