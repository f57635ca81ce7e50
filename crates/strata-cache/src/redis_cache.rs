//! Redis-based cache implementation.

use crate::CacheClient;
use async_trait::async_trait;
use deadpool_redis::{redis, redis::AsyncCommands, Pool, Runtime};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_config::CacheConfig;
use strata_core::{StrataError, StrataResult};
use tracing::debug;

/// Redis-based cache client.
///
/// A missing pool makes every operation a no-op miss, which keeps the
/// cache-aside path working with caching disabled.
pub struct RedisCache {
    pool: Option<Arc<Pool>>,
}

impl RedisCache {
    /// Creates a cache client over an existing pool.
    #[must_use]
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool: Some(pool) }
    }

    /// Builds a pool from configuration and wraps it.
    ///
    /// Pool creation failure is a connection error and is not retried.
    pub fn connect(config: &CacheConfig) -> StrataResult<Self> {
        let mut cfg = deadpool_redis::Config::from_url(&config.url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StrataError::connection(format!("Failed to create Redis pool: {}", e)))?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates a no-op cache client (for when caching is disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    async fn conn(&self) -> StrataResult<deadpool_redis::Connection> {
        match &self.pool {
            Some(pool) => pool.get().await.map_err(|e| {
                StrataError::cache(format!("Failed to get Redis connection: {}", e))
            }),
            None => Err(StrataError::cache("Cache is disabled".to_string())),
        }
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    async fn get_raw(&self, key: &str) -> StrataResult<Option<String>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut conn = self.conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to get key '{}': {}", key, e)))?;

        match &value {
            Some(_) => debug!("Cache hit for key '{}'", key),
            None => debug!("Cache miss for key '{}'", key),
        }

        Ok(value)
    }

    async fn get_many_raw(&self, keys: &[String]) -> StrataResult<HashMap<String, String>> {
        if !self.is_enabled() || keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.conn().await?;
        let values: Vec<Option<String>> = conn
            .mget(keys)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to multi-get {} keys: {}", keys.len(), e)))?;

        let mut found = HashMap::new();
        for (key, value) in keys.iter().zip(values) {
            if let Some(value) = value {
                found.insert(key.clone(), value);
            }
        }
        debug!("Multi-get: {}/{} keys found", found.len(), keys.len());
        Ok(found)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut conn = self.conn().await?;
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            conn.set::<_, _, ()>(key, value)
                .await
                .map_err(|e| StrataError::cache(format!("Failed to set key '{}': {}", key, e)))?;
        } else {
            conn.set_ex::<_, _, ()>(key, value, ttl_secs)
                .await
                .map_err(|e| StrataError::cache(format!("Failed to set key '{}': {}", key, e)))?;
        }
        Ok(())
    }

    async fn add_raw(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if ttl.as_secs() > 0 {
            cmd.arg("EX").arg(ttl.as_secs());
        }
        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to add key '{}': {}", key, e)))?;
        Ok(reply.is_some())
    }

    async fn append(&self, key: &str, value: &str) -> StrataResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.conn().await?;
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to check key '{}': {}", key, e)))?;
        if !exists {
            return Ok(false);
        }
        conn.append::<_, _, i64>(key, value)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to append to key '{}': {}", key, e)))?;
        Ok(true)
    }

    async fn prepend(&self, key: &str, value: &str) -> StrataResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        // Redis has no server-side PREPEND; read-modify-write, keeping TTL.
        let mut conn = self.conn().await?;
        let current: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to get key '{}': {}", key, e)))?;
        let Some(current) = current else {
            return Ok(false);
        };
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(format!("{}{}", value, current))
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to prepend to key '{}': {}", key, e)))?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.conn().await?;
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to delete key '{}': {}", key, e)))?;

        debug!("Deleted key '{}': {}", key, deleted > 0);
        Ok(deleted > 0)
    }

    async fn increment(&self, key: &str, count: i64) -> StrataResult<i64> {
        if !self.is_enabled() {
            return Ok(count);
        }

        let mut conn = self.conn().await?;
        match conn.incr::<_, _, i64>(key, count).await {
            Ok(value) => Ok(value),
            Err(_) => {
                // Non-numeric counter: first-use fallback, same as a fresh set.
                self.set_raw(key, &count.to_string(), Duration::ZERO).await?;
                Ok(count)
            }
        }
    }

    async fn decrement(&self, key: &str, count: i64) -> StrataResult<i64> {
        self.increment(key, -count).await
    }

    async fn flush(&self) -> StrataResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut conn = self.conn().await?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| StrataError::cache(format!("Failed to flush cache: {}", e)))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
