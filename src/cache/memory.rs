//! In-process cache backend

use crate::cache::{CacheEntry, CacheError, CacheResult, CacheStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Cache held in a mutex-guarded map; lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;

        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry::new(key, value, ttl)?;
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;

        let now = Utc::now();
        entries.retain(|_, existing| !existing.is_expired_at(now));
        entries.insert(key.to_string(), entry);
        Ok(())
    }
}
