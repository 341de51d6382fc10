//! Configuration module for Stall-Scraper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use stall_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scraper.toml")).unwrap();
//! println!("Retrying each page up to {} times", config.fetch.max_retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AccessConfig, CacheBackend, CacheConfig, Config, FetchConfig, OutputConfig, PipelineConfig,
    SelectorConfig, SourceConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
