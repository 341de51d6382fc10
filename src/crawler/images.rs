//! Image resolution with download dedup
//!
//! Resolving an image URL yields the local path of the stored image. The
//! cache is consulted first so each URL is downloaded at most once per
//! cache lifetime; failures never propagate, they produce
//! [`ImagePath::Unresolved`].

use crate::cache::{dedup_key, CacheStore};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::product::ImagePath;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why an image could not be resolved
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no file name in image URL {url}")]
    NoFilename { url: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolves image URLs to locally stored files
pub struct ImageResolver {
    fetcher: Fetcher,
    cache: Arc<dyn CacheStore>,
    image_dir: PathBuf,
    ttl: Duration,
}

impl ImageResolver {
    /// Creates a resolver storing images under `image_dir`
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Used for single-attempt image downloads
    /// * `cache` - Dedup store shared with other resolvers and runs
    /// * `image_dir` - Directory images are written to (created on demand)
    /// * `ttl` - Lifetime of a freshly stored cache entry
    pub fn new(
        fetcher: Fetcher,
        cache: Arc<dyn CacheStore>,
        image_dir: impl Into<PathBuf>,
        ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache,
            image_dir: image_dir.into(),
            ttl,
        }
    }

    /// Resolves an image URL, absorbing any failure
    pub async fn resolve(&self, image_url: &str) -> ImagePath {
        match self.try_resolve(image_url).await {
            Ok(path) => ImagePath::Stored(path),
            Err(e) => {
                tracing::warn!("Could not resolve image {}: {}", image_url, e);
                ImagePath::Unresolved
            }
        }
    }

    /// Resolves an image URL, reporting why resolution failed
    ///
    /// A live cache entry short-circuits the download. Cache backend errors
    /// are logged and treated as a miss on lookup, and ignored on store.
    pub async fn try_resolve(&self, image_url: &str) -> Result<String, ImageError> {
        let key = dedup_key(image_url);

        match self.cache.get(&key) {
            Ok(Some(path)) => {
                tracing::debug!("Image cache hit for {} -> {}", image_url, path);
                return Ok(path);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Image cache lookup failed for {}: {}", image_url, e);
            }
        }

        let filename = image_filename(image_url)?;
        let bytes = self.fetcher.fetch_bytes(image_url).await?;

        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .map_err(|source| ImageError::Io {
                path: self.image_dir.clone(),
                source,
            })?;

        // Same basename from another URL overwrites: last resolved wins
        let path = self.image_dir.join(filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| ImageError::Io {
                path: path.clone(),
                source,
            })?;

        let stored = path.to_string_lossy().into_owned();
        tracing::debug!("Stored image {} ({} bytes) at {}", image_url, bytes.len(), stored);

        if let Err(e) = self.cache.set(&key, &stored, self.ttl) {
            tracing::warn!("Failed to cache image path for {}: {}", image_url, e);
        }

        Ok(stored)
    }
}

/// Derives the local file name from the URL's final path segment
fn image_filename(image_url: &str) -> Result<String, ImageError> {
    let no_filename = || ImageError::NoFilename {
        url: image_url.to_string(),
    };

    let url = Url::parse(image_url).map_err(|_| no_filename())?;
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .ok_or_else(no_filename)?;

    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(no_filename());
    }

    Ok(segment.to_string())
}
