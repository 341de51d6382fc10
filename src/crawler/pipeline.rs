//! Pipeline orchestration - the page loop
//!
//! This module drives one scrape run:
//! - Builds the URL of each page `1..=pages_limit`, in order
//! - Fetches each page (with retries) and parses its product units
//! - Resolves every product's image through the dedup cache
//! - Pauses between pages
//! - Returns the records as a snapshot, or the first page failure
//!
//! Runs are all-or-nothing: a page that exhausts its retries aborts the run
//! and nothing is persisted.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::crawler::delay::{Sleeper, TokioSleeper};
use crate::crawler::fetcher::{FetchError, FetchSettings, Fetcher};
use crate::crawler::images::ImageResolver;
use crate::crawler::parser::{ProductParser, ProductSelectors};
use crate::output::{SnapshotWriter, StorageError};
use crate::product::{ImagePath, ProductRecord, Snapshot};
use crate::ConfigError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pages_limit must be a positive integer, got {0}")]
    InvalidPagesLimit(u32),

    #[error("Failed to prepare HTTP client: {0}")]
    Setup(#[source] FetchError),

    #[error("Cannot build URL for page {page}: {reason}")]
    PageUrl { page: u32, reason: String },

    #[error("Page {page} ({url}) failed: {source}")]
    Page {
        page: u32,
        url: String,
        source: FetchError,
    },

    #[error("Failed to save snapshot: {0}")]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// The page number the run failed on, if the failure was page-level
    pub fn failed_page(&self) -> Option<u32> {
        match self {
            Self::Page { page, .. } | Self::PageUrl { page, .. } => Some(*page),
            _ => None,
        }
    }
}

/// Drives fetch → parse → resolve over a range of listing pages
pub struct Pipeline {
    base_url: Url,
    fetch_settings: FetchSettings,
    parser: ProductParser,
    cache: Arc<dyn CacheStore>,
    image_dir: PathBuf,
    cache_ttl: Duration,
    rate_limit_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
    writer: SnapshotWriter,
}

impl Pipeline {
    /// Creates a pipeline from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `cache` - Image dedup store; it outlives the pipeline and may be
    ///   shared with other pipelines
    pub fn from_config(config: &Config, cache: Arc<dyn CacheStore>) -> Result<Self, ConfigError> {
        let base_url = directory_url(&config.source.base_url)?;
        let selectors = ProductSelectors::from_config(&config.selectors)?;

        Ok(Self {
            base_url,
            fetch_settings: FetchSettings::from_config(config),
            parser: ProductParser::new(selectors, config.pipeline.skip_units_without_image),
            cache,
            image_dir: PathBuf::from(&config.output.image_dir),
            cache_ttl: config.cache.ttl(),
            rate_limit_delay: config.pipeline.rate_limit_delay(),
            sleeper: Arc::new(TokioSleeper),
            writer: SnapshotWriter::new(&config.output.snapshot_path),
        })
    }

    /// Replaces the sleeper used for retry back-off and page pacing
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Builds the URL of a listing page
    ///
    /// Page 1 is the base URL itself; page `n` is `<base>page/<n>/`.
    pub fn page_url(&self, page: u32) -> Result<Url, PipelineError> {
        if page <= 1 {
            return Ok(self.base_url.clone());
        }

        self.base_url
            .join(&format!("page/{}/", page))
            .map_err(|e| PipelineError::PageUrl {
                page,
                reason: e.to_string(),
            })
    }

    /// Scrapes pages `1..=pages_limit` and returns their records
    ///
    /// # Arguments
    ///
    /// * `pages_limit` - Number of pages to fetch (must be positive)
    /// * `proxy` - Optional proxy URL for both HTTP and HTTPS traffic
    ///
    /// The rate-limit delay is awaited between consecutive pages only: never
    /// after the last requested page, so a single-page run does not pause.
    ///
    /// # Returns
    ///
    /// * `Ok(Snapshot)` - Records in page order, then document order
    /// * `Err(PipelineError)` - The first page failure; no partial result
    pub async fn run(&self, pages_limit: u32, proxy: Option<&str>) -> Result<Snapshot, PipelineError> {
        if pages_limit == 0 {
            return Err(PipelineError::InvalidPagesLimit(pages_limit));
        }

        let fetcher = Fetcher::new(self.fetch_settings.clone(), proxy, Arc::clone(&self.sleeper))
            .map_err(PipelineError::Setup)?;
        let resolver = ImageResolver::new(
            fetcher.clone(),
            Arc::clone(&self.cache),
            self.image_dir.clone(),
            self.cache_ttl,
        );

        tracing::info!(
            "Starting run over {} page(s) from {}{}",
            pages_limit,
            self.base_url,
            if proxy.is_some() { " via proxy" } else { "" }
        );

        let mut records = Vec::new();

        for page in 1..=pages_limit {
            let url = self.page_url(page)?;
            tracing::info!("Fetching page {}/{}: {}", page, pages_limit, url);

            let body = fetcher
                .fetch(url.as_str())
                .await
                .map_err(|source| PipelineError::Page {
                    page,
                    url: url.to_string(),
                    source,
                })?;

            let candidates = self.parser.parse(&body, &url);
            let found = candidates.len();

            for candidate in candidates {
                let image_path = match &candidate.image_url {
                    Some(image_url) => resolver.resolve(image_url).await,
                    None => ImagePath::Unresolved,
                };

                records.push(ProductRecord {
                    title: candidate.title,
                    price: candidate.price,
                    image_path,
                });
            }

            tracing::info!("Page {} yielded {} product(s)", page, found);

            if page < pages_limit {
                self.sleeper.sleep(self.rate_limit_delay).await;
            }
        }

        tracing::info!("Run complete: {} product(s)", records.len());
        Ok(Snapshot::new(records))
    }

    /// Runs the pipeline and persists the snapshot
    ///
    /// The snapshot file is only touched once every page succeeded.
    pub async fn run_and_save(
        &self,
        pages_limit: u32,
        proxy: Option<&str>,
    ) -> Result<Snapshot, PipelineError> {
        let snapshot = self.run(pages_limit, proxy).await?;
        self.writer.save(&snapshot)?;
        tracing::info!(
            "Scraped and saved {} products to {}",
            snapshot.len(),
            self.writer.path().display()
        );
        Ok(snapshot)
    }
}

/// Parses the base URL and makes sure it ends in `/` so page paths join below it
fn directory_url(base_url: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", base_url, e)))?;

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
