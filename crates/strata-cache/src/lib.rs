//! # Strata Cache
//!
//! Distributed cache client for the strata access layer: an object-safe
//! [`CacheClient`] trait with Redis and in-memory implementations, a typed
//! extension trait with compute-on-miss, and namespaced key patterns.

mod client;
pub mod keys;
pub mod memory;
mod redis_cache;

pub use client::{CacheClient, CacheExt};
pub use keys::CacheKeys;
pub use memory::InMemoryCache;
pub use redis_cache::RedisCache;
