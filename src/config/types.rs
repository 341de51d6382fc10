use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Stall-Scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Where listing pages come from
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// URL of the first listing page; page `n` lives at `<base-url>page/<n>/`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Retry and timeout policy for page fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per page, including the first one
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Wait between failed attempts (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// 4xx status codes treated as transient; 5xx are always transient
    #[serde(rename = "retry-statuses")]
    pub retry_statuses: Vec<u16>,
}

/// Pagination behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between consecutive pages (milliseconds)
    #[serde(rename = "rate-limit-delay-ms")]
    pub rate_limit_delay_ms: u64,

    /// Drop product units that carry no image URL instead of emitting
    /// them with the unresolved marker
    #[serde(rename = "skip-units-without-image")]
    pub skip_units_without_image: bool,
}

/// Which store backs the image dedup cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Sqlite,
}

/// Image dedup cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// SQLite database file (sqlite backend only)
    pub path: String,

    /// Lifetime of a resolved image entry (seconds)
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the JSON snapshot file
    #[serde(rename = "snapshot-path")]
    pub snapshot_path: String,

    /// Directory downloaded images are written to
    #[serde(rename = "image-dir")]
    pub image_dir: String,
}

/// Static token checked by the request-handling front end
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    pub token: Option<String>,
}

/// CSS selectors locating product data in a listing page
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// One repeated product unit
    pub product: String,
    /// Title element, relative to the unit
    pub title: String,
    /// Price element, relative to the unit
    pub price: String,
    /// Image element, relative to the unit
    pub image: String,
}

fn default_user_agent() -> String {
    format!("stall-scraper/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 5_000,
            request_timeout_ms: 10_000,
            retry_statuses: vec![408, 429],
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_ms: 2_000,
            skip_units_without_image: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            path: "image-cache.db".to_string(),
            ttl_secs: 60 * 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "products.json".to_string(),
            image_dir: "images".to_string(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            product: "li.product".to_string(),
            title: ".woo-loop-product__title a".to_string(),
            price: ".price".to_string(),
            image: ".mf-product-thumbnail img".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl PipelineConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AccessConfig {
    /// Checks a token presented by a client
    ///
    /// Returns `false` when no token is configured, so an unconfigured front
    /// end rejects every request rather than accepting all of them.
    pub fn verify_token(&self, presented: Option<&str>) -> bool {
        match (&self.token, presented) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }
}
