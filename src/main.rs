//! Stall-Scraper main entry point
//!
//! This is the command-line interface for the Stall-Scraper product harvester.

use anyhow::Context;
use clap::Parser;
use stall_scraper::cache::MemoryCache;
use stall_scraper::config::{load_config_with_hash, Config};
use stall_scraper::crawler::{scrape, Pipeline};
use stall_scraper::output::SnapshotWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Stall-Scraper: a paginated product listing harvester
///
/// Fetches listing pages, extracts product titles, prices, and images,
/// stores images locally, and writes all products to a JSON snapshot.
#[derive(Parser, Debug)]
#[command(name = "stall-scraper")]
#[command(version)]
#[command(about = "A paginated product listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Number of listing pages to scrape
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pages: u32,

    /// Proxy URL used for both HTTP and HTTPS requests
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show which pages would be fetched
    #[arg(long, conflicts_with = "show")]
    dry_run: bool,

    /// Print the current snapshot and exit
    #[arg(long, conflicts_with = "dry_run")]
    show: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, cli.pages, cli.proxy.as_deref())?;
    } else if cli.show {
        handle_show(&config)?;
    } else {
        handle_scrape(&config, cli.pages, cli.proxy.as_deref()).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("stall_scraper=info,warn"),
            1 => EnvFilter::new("stall_scraper=debug,info"),
            2 => EnvFilter::new("stall_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings and page URLs
fn handle_dry_run(config: &Config, pages: u32, proxy: Option<&str>) -> anyhow::Result<()> {
    println!("=== Stall-Scraper Dry Run ===\n");

    println!("Source:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  User agent: {}", config.source.user_agent);
    println!("  Proxy: {}", proxy.unwrap_or("none"));

    println!("\nFetching:");
    println!("  Max retries: {}", config.fetch.max_retries);
    println!("  Retry delay: {}ms", config.fetch.retry_delay_ms);
    println!("  Request timeout: {}ms", config.fetch.request_timeout_ms);
    println!("  Page delay: {}ms", config.pipeline.rate_limit_delay_ms);

    println!("\nCache:");
    println!("  Backend: {:?}", config.cache.backend);
    println!("  TTL: {}s", config.cache.ttl_secs);

    println!("\nOutput:");
    println!("  Snapshot: {}", config.output.snapshot_path);
    println!("  Images: {}", config.output.image_dir);

    let pipeline = Pipeline::from_config(config, Arc::new(MemoryCache::new()))?;
    println!("\nPages ({}):", pages);
    for page in 1..=pages {
        println!("  - {}", pipeline.page_url(page)?);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --show mode: prints the persisted snapshot
fn handle_show(config: &Config) -> anyhow::Result<()> {
    let writer = SnapshotWriter::new(&config.output.snapshot_path);
    let snapshot = writer
        .load()
        .with_context(|| format!("failed to read {}", writer.path().display()))?;

    println!("Snapshot: {} ({} products)\n", writer.path().display(), snapshot.len());
    for record in snapshot.iter() {
        println!("{}  {}  {}", record.price, record.title, record.image_path);
    }

    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(config: &Config, pages: u32, proxy: Option<&str>) -> anyhow::Result<()> {
    match scrape(config, pages, proxy).await {
        Ok(snapshot) => {
            println!("Scraped and saved {} products", snapshot.len());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            Err(e.into())
        }
    }
}
