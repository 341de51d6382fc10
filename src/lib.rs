//! Stall-Scraper: a paginated product listing harvester
//!
//! This crate fetches product listing pages from a shop, extracts product
//! records (title, price, image), downloads each product image once per cache
//! lifetime, and persists the aggregated result as a single JSON snapshot.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod product;

use thiserror::Error;

pub use cache::CacheError;
pub use crawler::{FetchError, ImageError, PipelineError};
pub use output::StorageError;

/// Main error type for Stall-Scraper operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Result type alias for Stall-Scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheStore, MemoryCache, SqliteCache};
pub use config::Config;
pub use crawler::{Fetcher, ImageResolver, Pipeline};
pub use output::SnapshotWriter;
pub use product::{ImagePath, ProductRecord, Snapshot};
