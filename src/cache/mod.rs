//! Image dedup cache
//!
//! The cache maps a dedup key (derived from an image URL) to the local path
//! the image was stored at. Entries carry an absolute expiry; an expired
//! entry reads as a miss so the image is downloaded again.
//!
//! The store outlives a single pipeline run and may be shared between runs,
//! so implementations are `Send + Sync` and safe to use from several tasks.

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::config::{CacheBackend, CacheConfig};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a cache backend
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored expiry '{0}' is not a valid timestamp")]
    BadExpiry(String),

    #[error("TTL of {0:?} is out of range")]
    TtlOutOfRange(Duration),

    #[error("Cache lock poisoned")]
    Poisoned,
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store with per-entry expiry
pub trait CacheStore: Send + Sync {
    /// Returns the live value for `key`, or `None` on a miss or expired entry
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry, for `ttl`
    fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
}

/// One cached value together with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry that expires `ttl` from now
    pub fn new(key: &str, value: &str, ttl: Duration) -> CacheResult<Self> {
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: expiry_after(Utc::now(), ttl)?,
        })
    }

    /// Checks whether the entry is expired at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Computes the absolute expiry `ttl` after `now`
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> CacheResult<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(ttl).map_err(|_| CacheError::TtlOutOfRange(ttl))?;
    now.checked_add_signed(delta)
        .ok_or(CacheError::TtlOutOfRange(ttl))
}

/// Derives the dedup key for an image URL (hex-encoded SHA-256)
pub fn dedup_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Opens the cache backend selected in the configuration
pub fn open_cache(config: &CacheConfig) -> CacheResult<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Memory => {
            tracing::debug!("Using in-memory image cache");
            Ok(Arc::new(MemoryCache::new()))
        }
        CacheBackend::Sqlite => {
            tracing::debug!("Using SQLite image cache at {}", config.path);
            Ok(Arc::new(SqliteCache::open(Path::new(&config.path))?))
        }
    }
}
