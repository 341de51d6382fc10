//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building HTTP clients with user agent, timeout, and optional proxy
//! - GET requests for listing pages, retried with a fixed delay
//! - Single-shot GET requests for image bytes
//! - Classifying failures as transient (retryable) or final

use crate::config::{Config, FetchConfig};
use crate::crawler::delay::Sleeper;
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// One failed attempt that is worth retrying
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),
}

/// Errors returned by the fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        proxy: String,
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Rejected { url: String, status: u16 },

    #[error("Giving up on {url} after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: AttemptFailure,
    },
}

/// Retry and transport settings for a [`Fetcher`]
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Attempts per page, including the first one
    pub max_retries: u32,
    /// Wait between failed attempts
    pub retry_delay: Duration,
    /// Per-attempt timeout
    pub request_timeout: Duration,
    /// 4xx codes treated as transient
    pub retry_statuses: Vec<u16>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_fetch_config(&FetchConfig::default(), "stall-scraper")
    }
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self::from_fetch_config(&config.fetch, &config.source.user_agent)
    }

    fn from_fetch_config(fetch: &FetchConfig, user_agent: &str) -> Self {
        Self {
            max_retries: fetch.max_retries.max(1),
            retry_delay: fetch.retry_delay(),
            request_timeout: fetch.request_timeout(),
            retry_statuses: fetch.retry_statuses.clone(),
            user_agent: user_agent.to_string(),
        }
    }

    /// Whether a non-success status may succeed on a later attempt
    ///
    /// 5xx always qualifies; 4xx only when listed in `retry_statuses`.
    pub fn is_transient(&self, status: StatusCode) -> bool {
        status.is_server_error() || self.retry_statuses.contains(&status.as_u16())
    }
}

/// Builds an HTTP client with proper configuration
///
/// When `proxy` is given it is used for both HTTP and HTTPS traffic.
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError)` - The proxy URL is malformed or the client could not be built
pub fn build_http_client(settings: &FetchSettings, proxy: Option<&str>) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.request_timeout)
        .connect_timeout(settings.request_timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        let route = Proxy::all(proxy).map_err(|source| FetchError::InvalidProxy {
            proxy: proxy.to_string(),
            source,
        })?;
        builder = builder.proxy(route);
    }

    builder.build().map_err(FetchError::Client)
}

/// Parses a URL, accepting only absolute http(s) URLs
fn parse_target(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(parsed)
}

/// Outcome of a single request
enum Attempt<T> {
    Done(T),
    Retry(AttemptFailure),
    Fail(FetchError),
}

/// Retrieves page bodies and raw bytes over HTTP
///
/// Cloning is cheap: the underlying client and sleeper are shared.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    settings: Arc<FetchSettings>,
    sleeper: Arc<dyn Sleeper>,
}

impl Fetcher {
    /// Creates a fetcher, routing through `proxy` when given
    pub fn new(
        settings: FetchSettings,
        proxy: Option<&str>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, FetchError> {
        let client = build_http_client(&settings, proxy)?;
        Ok(Self {
            client,
            settings: Arc::new(settings),
            sleeper,
        })
    }

    /// Fetches a URL's body text with bounded retries
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Malformed or non-http(s) URL | Immediate `InvalidUrl` |
    /// | Transport error / timeout | Retry after `retry_delay` |
    /// | HTTP 5xx | Retry after `retry_delay` |
    /// | HTTP 4xx listed in `retry_statuses` | Retry after `retry_delay` |
    /// | Any other non-2xx | Immediate `Rejected` |
    ///
    /// No delay follows the final attempt; once `max_retries` attempts have
    /// failed the last failure is returned inside `FetchError::Exhausted`.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let target = parse_target(url)?;
        let max_attempts = self.settings.max_retries;
        let mut attempt = 1;

        loop {
            let failure = match self.fetch_text_once(&target).await {
                Attempt::Done(body) => {
                    if attempt > 1 {
                        tracing::info!("Fetched {} on attempt {}", url, attempt);
                    }
                    return Ok(body);
                }
                Attempt::Fail(error) => return Err(error),
                Attempt::Retry(failure) => failure,
            };

            if attempt >= max_attempts {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}; giving up",
                    attempt,
                    max_attempts,
                    url,
                    failure
                );
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: failure,
                });
            }

            tracing::warn!(
                "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                attempt,
                max_attempts,
                url,
                failure,
                self.settings.retry_delay
            );
            self.sleeper.sleep(self.settings.retry_delay).await;
            attempt += 1;
        }
    }

    /// Fetches raw bytes with a single attempt
    ///
    /// Used for images, where a failure must not hold up the page.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let target = parse_target(url)?;

        let response = match self.send(&target).await {
            Attempt::Done(response) => response,
            Attempt::Retry(last) => return Err(self.single_attempt_failure(url, last)),
            Attempt::Fail(error) => return Err(error),
        };

        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => Err(self.single_attempt_failure(url, AttemptFailure::Transport(e))),
        }
    }

    fn single_attempt_failure(&self, url: &str, last: AttemptFailure) -> FetchError {
        FetchError::Exhausted {
            url: url.to_string(),
            attempts: 1,
            last,
        }
    }

    async fn fetch_text_once(&self, target: &Url) -> Attempt<String> {
        match self.send(target).await {
            Attempt::Done(response) => match response.text().await {
                Ok(body) => Attempt::Done(body),
                Err(e) => Attempt::Retry(AttemptFailure::Transport(e)),
            },
            Attempt::Retry(failure) => Attempt::Retry(failure),
            Attempt::Fail(error) => Attempt::Fail(error),
        }
    }

    /// Sends one GET and classifies the response status
    async fn send(&self, target: &Url) -> Attempt<reqwest::Response> {
        let response = match self.client.get(target.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(AttemptFailure::Transport(e)),
        };

        let status = response.status();
        if status.is_success() {
            Attempt::Done(response)
        } else if self.settings.is_transient(status) {
            Attempt::Retry(AttemptFailure::Status(status.as_u16()))
        } else {
            Attempt::Fail(FetchError::Rejected {
                url: target.to_string(),
                status: status.as_u16(),
            })
        }
    }
}
