//! Crawler module for listing page scraping
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and price normalization
//! - Image download with dedup caching
//! - Page-by-page orchestration and pacing

mod delay;
mod fetcher;
mod images;
mod parser;
mod pipeline;

pub use delay::{NoSleep, Sleeper, TokioSleeper};
pub use fetcher::{build_http_client, AttemptFailure, FetchError, FetchSettings, Fetcher};
pub use images::{ImageError, ImageResolver};
pub use parser::{normalize_price, CandidateRecord, ProductParser, ProductSelectors, STARTING_AT_MARKER};
pub use pipeline::{Pipeline, PipelineError};

use crate::cache::open_cache;
use crate::config::Config;
use crate::product::Snapshot;
use crate::ScrapeError;

/// Runs a complete scrape and persists the snapshot
///
/// This is the main entry point for the command line. It will:
/// 1. Open the configured image cache
/// 2. Scrape pages `1..=pages_limit`
/// 3. Write the snapshot, replacing the previous one
///
/// # Arguments
///
/// * `config` - The scraper configuration
/// * `pages_limit` - Number of pages to scrape
/// * `proxy` - Optional proxy URL
///
/// # Returns
///
/// * `Ok(Snapshot)` - The records that were saved
/// * `Err(ScrapeError)` - The run failed and nothing was written
pub async fn scrape(
    config: &Config,
    pages_limit: u32,
    proxy: Option<&str>,
) -> Result<Snapshot, ScrapeError> {
    let cache = open_cache(&config.cache)?;
    let pipeline = Pipeline::from_config(config, cache)?;
    Ok(pipeline.run_and_save(pages_limit, proxy).await?)
}
