//! Cache client trait for abstracted caching operations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use strata_core::StrataResult;

/// Cache client for storing and retrieving cached data.
///
/// Abstracts over cache backends (Redis, in-memory) so repositories and
/// tests can swap implementations. Values are JSON strings for
/// dyn-compatibility; typed access goes through [`CacheExt`].
///
/// A transport failure is reported as `Err`; callers must treat it as a
/// cache miss, never as confirmed absence of data.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Check if caching is enabled.
    fn is_enabled(&self) -> bool;

    /// Get a raw value. `None` when the key is absent or expired.
    async fn get_raw(&self, key: &str) -> StrataResult<Option<String>>;

    /// Get many raw values in one round trip.
    ///
    /// The result contains only the keys present in the cache; absent keys
    /// are simply missing from the map.
    async fn get_many_raw(&self, keys: &[String]) -> StrataResult<HashMap<String, String>>;

    /// Set a raw value with a TTL. A zero TTL means no expiry.
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()>;

    /// Set a raw value only if the key is absent. Returns whether it was set.
    async fn add_raw(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<bool>;

    /// Append to a string value at the server. Returns whether the key existed.
    async fn append(&self, key: &str, value: &str) -> StrataResult<bool>;

    /// Prepend to a string value at the server. Returns whether the key existed.
    async fn prepend(&self, key: &str, value: &str) -> StrataResult<bool>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> StrataResult<bool>;

    /// Atomically increment a counter by `count`.
    ///
    /// On a missing or non-numeric counter, falls back to `set(key, count)`
    /// and returns `count`. The fallback is not atomic with the failed
    /// increment; two racing first increments can lose an update.
    async fn increment(&self, key: &str, count: i64) -> StrataResult<i64>;

    /// Decrement a counter; an increment of `-count`.
    async fn decrement(&self, key: &str, count: i64) -> StrataResult<i64>;

    /// Clear the entire cache pool.
    async fn flush(&self) -> StrataResult<()>;
}

/// Extension trait with typed methods for convenience.
#[async_trait]
pub trait CacheExt: CacheClient {
    /// Get a typed value from the cache.
    async fn get<T: serde::de::DeserializeOwned + Send>(&self, key: &str) -> StrataResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => {
                let value: T = serde_json::from_str(&json)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Get many typed values, keyed as stored. Absent keys are omitted.
    async fn get_many<T: serde::de::DeserializeOwned + Send>(
        &self,
        keys: &[String],
    ) -> StrataResult<HashMap<String, T>> {
        let raw = self.get_many_raw(keys).await?;
        let mut out = HashMap::with_capacity(raw.len());
        for (key, json) in raw {
            let value: T = serde_json::from_str(&json)?;
            out.insert(key, value);
        }
        Ok(out)
    }

    /// Set a typed value in the cache.
    async fn set<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> StrataResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, &json, ttl).await
    }

    /// Get a value, or compute and cache it on a miss.
    ///
    /// The computed value is written back under `key` before being
    /// returned; a failed write-back is ignored since the value is valid.
    async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Duration, factory: F) -> StrataResult<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = StrataResult<T>> + Send,
    {
        if let Ok(Some(cached)) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = factory().await?;
        let _ = self.set(key, &value, ttl).await;
        Ok(value)
    }
}

// Blanket implementation for all CacheClient implementations
impl<T: CacheClient + ?Sized> CacheExt for T {}
