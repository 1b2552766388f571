//! Rate-limited document fetcher
//!
//! This module handles every page request the crawler makes:
//! - Resolving site-relative paths against the configured root
//! - A fixed delay before each request
//! - Bounded cooldown-and-retry on HTTP 429
//! - Classifying every other failure as a `FetchError`

use crate::config::FetcherConfig;
use crate::crawler::source::PageSource;
use crate::FetchError;
use scraper::Html;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

/// A fetched HTML document
#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    body: String,
}

impl Document {
    pub fn new(url: Url, body: String) -> Self {
        Self { url, body }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parses the body into a queryable tree
    ///
    /// Parsed trees are not `Send`; parse, query, and drop them before the
    /// next await point.
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Pacing and rate-limit recovery settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay before every request
    pub request_delay: Duration,
    /// Cooldown after the first rate-limited response
    pub cooldown: Duration,
    /// Retries allowed after rate-limited responses
    pub max_retries: u32,
    /// Cooldown multiplier per additional rate-limited attempt
    pub backoff_factor: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            cooldown: Duration::from_millis(config.rate_limit_cooldown_ms),
            max_retries: config.max_rate_limit_retries,
            backoff_factor: config.backoff_factor.max(1),
        }
    }

    /// Cooldown before retrying after the `attempt`-th rate-limited response
    /// (1-based): `cooldown * backoff_factor^(attempt - 1)`
    pub fn cooldown_for(&self, attempt: u32) -> Duration {
        let multiplier = self
            .backoff_factor
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.cooldown.saturating_mul(multiplier)
    }
}

/// Where a single fetch stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
    /// About to send a request; `rate_limited` responses seen so far
    Fetching { rate_limited: u32 },
    /// The `attempt`-th request was answered with 429
    RateLimited { attempt: u32 },
}

/// Fetches one document at a time with a fixed delay and bounded 429 backoff
pub struct RateLimitedFetcher {
    source: Box<dyn PageSource>,
    base_url: Url,
    policy: RetryPolicy,
    requests: AtomicU64,
    rate_limited: AtomicU64,
}

impl RateLimitedFetcher {
    pub fn new(source: Box<dyn PageSource>, base_url: Url, policy: RetryPolicy) -> Self {
        Self {
            source,
            base_url,
            policy,
            requests: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Requests sent so far, retries included
    pub fn requests_made(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Rate-limited responses received so far
    pub fn rate_limited_responses(&self) -> u64 {
        self.rate_limited.load(Ordering::Relaxed)
    }

    /// Resolves a site-relative path against the site root
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path.trim())
            .map_err(|source| FetchError::InvalidPath {
                path: path.to_string(),
                source,
            })
    }

    /// Fetches a site-relative path
    ///
    /// # Request Flow
    ///
    /// | Step | Action |
    /// |------|--------|
    /// | Before every request | Sleep `request_delay` |
    /// | HTTP 2xx | Return the document |
    /// | HTTP 429, retries left | Sleep `cooldown_for(attempt)`, request again |
    /// | HTTP 429, retries exhausted | `FetchError::RateLimited` |
    /// | Other status | `FetchError::Status` |
    /// | Timeout / connection failure | `FetchError::Timeout` / `FetchError::Transport` |
    pub async fn fetch(&self, path: &str) -> Result<Document, FetchError> {
        let url = self.resolve(path)?;
        let mut state = FetchState::Fetching { rate_limited: 0 };

        loop {
            match state {
                FetchState::Fetching { rate_limited } => {
                    tokio::time::sleep(self.policy.request_delay).await;
                    self.requests.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("GET {} via {}", url, self.source.name());

                    let page = self.source.get(&url).await.map_err(|e| {
                        tracing::warn!("Fetch failed for {}: {}", url, e);
                        e
                    })?;

                    if page.is_rate_limited() {
                        self.rate_limited.fetch_add(1, Ordering::Relaxed);
                        state = FetchState::RateLimited {
                            attempt: rate_limited + 1,
                        };
                        continue;
                    }

                    if !page.is_success() {
                        tracing::warn!("HTTP {} for {}", page.status, url);
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: page.status,
                        });
                    }

                    return Ok(Document::new(url, page.body));
                }

                FetchState::RateLimited { attempt } => {
                    if attempt > self.policy.max_retries {
                        tracing::warn!(
                            "Giving up on {} after {} rate-limited attempts",
                            url,
                            attempt
                        );
                        return Err(FetchError::RateLimited {
                            url: url.to_string(),
                            attempts: attempt,
                        });
                    }

                    let cooldown = self.policy.cooldown_for(attempt);
                    tracing::warn!(
                        "Rate limited on {} (attempt {}), cooling down for {:?}",
                        url,
                        attempt,
                        cooldown
                    );
                    tokio::time::sleep(cooldown).await;
                    state = FetchState::Fetching {
                        rate_limited: attempt,
                    };
                }
            }
        }
    }
}
