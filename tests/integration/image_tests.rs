//! Image resolution and download dedup

use crate::common::RecordingSleeper;
use stall_scraper::cache::{CacheError, CacheResult, CacheStore, MemoryCache, SqliteCache};
use stall_scraper::crawler::{FetchSettings, Fetcher, ImageResolver};
use stall_scraper::product::ImagePath;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake image";
const HOUR: Duration = Duration::from_secs(3600);

fn fetcher() -> Fetcher {
    Fetcher::new(FetchSettings::default(), None, RecordingSleeper::new()).unwrap()
}

fn resolver(cache: Arc<dyn CacheStore>, dir: &Path, ttl: Duration) -> ImageResolver {
    ImageResolver::new(fetcher(), cache, dir.join("images"), ttl)
}

async fn mount_image(server: &MockServer, image_path: &str, expected_downloads: u64) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES))
        .expect(expected_downloads)
        .mount(server)
        .await;
}

/// Cache whose backend always fails
struct BrokenCache;

impl CacheStore for BrokenCache {
    fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::Poisoned)
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::Poisoned)
    }
}

#[tokio::test]
async fn test_second_resolve_uses_cache() {
    let server = MockServer::start().await;
    mount_image(&server, "/uploads/mirror.png", 1).await;

    let dir = TempDir::new().unwrap();
    let resolver = resolver(Arc::new(MemoryCache::new()), dir.path(), HOUR);
    let url = format!("{}/uploads/mirror.png", server.uri());

    let first = resolver.resolve(&url).await;
    let second = resolver.resolve(&url).await;

    let expected = dir.path().join("images").join("mirror.png");
    assert_eq!(first, ImagePath::Stored(expected.to_string_lossy().into_owned()));
    assert_eq!(first, second);
    assert_eq!(std::fs::read(&expected).unwrap(), IMAGE_BYTES);
}

#[tokio::test]
async fn test_expired_entry_downloads_once_more() {
    let server = MockServer::start().await;
    mount_image(&server, "/uploads/probe.png", 2).await;

    let dir = TempDir::new().unwrap();
    let resolver = resolver(
        Arc::new(MemoryCache::new()),
        dir.path(),
        Duration::from_millis(200),
    );
    let url = format!("{}/uploads/probe.png", server.uri());

    let first = resolver.resolve(&url).await;
    let cached = resolver.resolve(&url).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    let refreshed = resolver.resolve(&url).await;
    let cached_again = resolver.resolve(&url).await;

    assert!(!first.is_unresolved());
    assert_eq!(first, cached);
    assert_eq!(first, refreshed);
    assert_eq!(refreshed, cached_again);
}

#[tokio::test]
async fn test_cache_is_shared_between_resolvers() {
    let server = MockServer::start().await;
    mount_image(&server, "/uploads/gloves.png", 1).await;

    let dir = TempDir::new().unwrap();
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let url = format!("{}/uploads/gloves.png", server.uri());

    let first_run = resolver(Arc::clone(&cache), dir.path(), HOUR);
    let second_run = resolver(Arc::clone(&cache), dir.path(), HOUR);

    assert_eq!(first_run.resolve(&url).await, second_run.resolve(&url).await);
}

#[tokio::test]
async fn test_sqlite_cache_survives_restart() {
    let server = MockServer::start().await;
    mount_image(&server, "/uploads/chair.png", 1).await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cache.db");
    let url = format!("{}/uploads/chair.png", server.uri());

    let first = {
        let cache = Arc::new(SqliteCache::open(&db).unwrap());
        resolver(cache, dir.path(), HOUR).resolve(&url).await
    };

    let cache = Arc::new(SqliteCache::open(&db).unwrap());
    let second = resolver(cache, dir.path(), HOUR).resolve(&url).await;

    assert!(!first.is_unresolved());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failed_download_is_unresolved_and_not_cached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/uploads/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let resolver = resolver(Arc::new(MemoryCache::new()), dir.path(), HOUR);
    let url = format!("{}/uploads/missing.png", server.uri());

    assert_eq!(resolver.resolve(&url).await, ImagePath::Unresolved);
    // The failure was not cached, so the next resolve tries again
    assert_eq!(resolver.resolve(&url).await, ImagePath::Unresolved);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let resolver = resolver(Arc::new(MemoryCache::new()), dir.path(), HOUR);

    let result = resolver
        .resolve(&format!("{}/uploads/flaky.png", server.uri()))
        .await;

    assert!(result.is_unresolved());
}

#[tokio::test]
async fn test_unwritable_image_dir_is_unresolved() {
    let server = MockServer::start().await;
    mount_image(&server, "/uploads/tray.png", 1).await;

    let dir = TempDir::new().unwrap();
    // A regular file where the image directory should be
    let blocker = dir.path().join("images");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let resolver = ImageResolver::new(fetcher(), Arc::new(MemoryCache::new()), &blocker, HOUR);

    let result = resolver
        .resolve(&format!("{}/uploads/tray.png", server.uri()))
        .await;

    assert!(result.is_unresolved());
}

#[tokio::test]
async fn test_url_without_filename_is_not_downloaded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let resolver = resolver(Arc::new(MemoryCache::new()), dir.path(), HOUR);

    let result = resolver.resolve(&format!("{}/uploads/", server.uri())).await;

    assert!(result.is_unresolved());
}

#[tokio::test]
async fn test_broken_cache_still_resolves() {
    let server = MockServer::start().await;
    mount_image(&server, "/uploads/lamp.png", 2).await;

    let dir = TempDir::new().unwrap();
    let resolver = resolver(Arc::new(BrokenCache), dir.path(), HOUR);
    let url = format!("{}/uploads/lamp.png", server.uri());

    // Without a working cache every resolve downloads
    assert!(!resolver.resolve(&url).await.is_unresolved());
    assert!(!resolver.resolve(&url).await.is_unresolved());
}

#[tokio::test]
async fn test_same_basename_last_resolved_wins() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"first".to_vec()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let resolver = resolver(Arc::new(MemoryCache::new()), dir.path(), HOUR);

    let first = resolver.resolve(&format!("{}/a/photo.jpg", server.uri())).await;
    let second = resolver.resolve(&format!("{}/b/photo.jpg", server.uri())).await;

    assert_eq!(first, second);
    let stored = dir.path().join("images").join("photo.jpg");
    assert_eq!(std::fs::read(stored).unwrap(), b"second");
}
