//! Unified error types for all layers of the access layer.

use thiserror::Error;

/// Unified error type for strata.
///
/// Covers the taxonomy of the access layer: configuration and connection
/// failures are fatal for the request, database and cache errors propagate
/// to the caller, and absence of data is never an error unless an
/// `or_fail`-style lookup asked for one.
#[derive(Error, Debug)]
pub enum StrataError {
    /// Missing or invalid configuration (unknown shard, undefined query kind).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Store or cache endpoint unreachable. Not retried.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver-level database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Cache transport error. Callers must treat this as a miss,
    /// never as confirmed absence of data.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Field validation failure surfaced as an error (bulk contexts only;
    /// repositories normally accumulate codes on the record instead).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity not found, raised only by `or_fail`-style lookups.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: u64 },

    /// Identifier codec failure (invalid character, overflow).
    #[error("Codec error: {0}")]
    Codec(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StrataError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection<T: Into<String>>(message: T) -> Self {
        Self::Connection(message.into())
    }

    /// Creates a cache error.
    #[must_use]
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache(message.into())
    }

    /// Creates a not found error for an entity type and id.
    #[must_use]
    pub fn not_found<T: Into<String>>(entity: T, id: u64) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// True when the failure came from the cache transport and the caller
    /// should fall through to the backing store.
    #[must_use]
    pub const fn is_cache_miss_equivalent(&self) -> bool {
        matches!(self, Self::Cache(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for StrataError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Configuration(_) => Self::Configuration(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                Self::Connection(err.to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}
