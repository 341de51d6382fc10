use crate::config::types::{
    AccessConfig, CacheBackend, CacheConfig, Config, FetchConfig, OutputConfig, SelectorConfig,
    SourceConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_fetch_config(&config.fetch)?;
    validate_cache_config(&config.cache)?;
    validate_output_config(&config.output)?;
    validate_access_config(&config.access)?;
    validate_selectors(&config.selectors)?;
    Ok(())
}

/// Validates the listing source
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry and timeout settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-ms must be greater than 0".to_string(),
        ));
    }

    if let Some(status) = config
        .retry_statuses
        .iter()
        .find(|status| !(400..=499).contains(*status))
    {
        return Err(ConfigError::Validation(format!(
            "retry-statuses may only list 4xx codes, got {}",
            status
        )));
    }

    Ok(())
}

/// Validates cache settings
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.backend == CacheBackend::Sqlite && config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "cache path cannot be empty with the sqlite backend".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.snapshot_path.is_empty() {
        return Err(ConfigError::Validation(
            "snapshot-path cannot be empty".to_string(),
        ));
    }

    if config.image_dir.is_empty() {
        return Err(ConfigError::Validation(
            "image-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_access_config(config: &AccessConfig) -> Result<(), ConfigError> {
    if matches!(&config.token, Some(token) if token.is_empty()) {
        return Err(ConfigError::Validation(
            "access token cannot be an empty string".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every selector parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.product,
        &config.title,
        &config.price,
        &config.image,
    ] {
        Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: selector.clone(),
            message: e.to_string(),
        })?;
    }

    Ok(())
}
