//! SQLite cache backend
//!
//! Entries persist in a single table, so dedup survives process restarts.

use crate::cache::{expiry_after, CacheError, CacheResult, CacheStore};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// SQL schema for the cache database
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
"#;

/// Fixed-width UTC timestamps so stored expiries compare correctly as text
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Cache backed by a SQLite database file
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Opens (or creates) the cache database at `path`
    ///
    /// Expired entries left by earlier processes are purged on open.
    pub fn open(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        Self::with_connection(conn)
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;

        let purged = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![timestamp(Utc::now())],
        )?;
        if purged > 0 {
            tracing::debug!("Purged {} expired cache entries", purged);
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheStore for SqliteCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| CacheError::BadExpiry(expires_at.clone()))?
            .with_timezone(&Utc);

        if Utc::now() >= expires_at {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            return Ok(None);
        }

        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let expires_at = expiry_after(Utc::now(), ttl)?;
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;

        conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, timestamp(expires_at)],
        )?;

        Ok(())
    }
}
