//! In-memory cache implementation.
//!
//! A process-local stand-in for the distributed cache: used by tests and by
//! embedders that want the cache-aside path without a cache server. TTLs
//! are accepted and ignored; entries live until deleted or flushed.

use crate::CacheClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use strata_core::StrataResult;

/// In-memory cache backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    /// Creates an empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CacheClient for InMemoryCache {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_raw(&self, key: &str) -> StrataResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn get_many_raw(&self, keys: &[String]) -> StrataResult<HashMap<String, String>> {
        let entries = self.entries.lock();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn set_raw(&self, key: &str, value: &str, _ttl: Duration) -> StrataResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn add_raw(&self, key: &str, value: &str, _ttl: Duration) -> StrataResult<bool> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn append(&self, key: &str, value: &str) -> StrataResult<bool> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(existing) => {
                existing.push_str(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn prepend(&self, key: &str, value: &str) -> StrataResult<bool> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(existing) => {
                existing.insert_str(0, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn increment(&self, key: &str, count: i64) -> StrataResult<i64> {
        let mut entries = self.entries.lock();
        match entries.get(key).and_then(|v| v.parse::<i64>().ok()) {
            Some(current) => {
                let next = current + count;
                entries.insert(key.to_string(), next.to_string());
                Ok(next)
            }
            None => {
                // First-use fallback, same semantics as the Redis client.
                entries.insert(key.to_string(), count.to_string());
                Ok(count)
            }
        }
    }

    async fn decrement(&self, key: &str, count: i64) -> StrataResult<i64> {
        self.increment(key, -count).await
    }

    async fn flush(&self) -> StrataResult<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
