//! Cache key patterns for consistent key naming.
//!
//! Keys are namespaced by a project prefix and the entity type name, with
//! the identifier (or a custom tag) as the final segment.

/// Builds namespaced cache keys for entity items and custom entries.
#[derive(Debug, Clone)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    /// Creates a key builder with the given project prefix.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            prefix: project.into(),
        }
    }

    /// Key for a single entity item.
    #[must_use]
    pub fn item(&self, entity: &str, id: u64) -> String {
        format!("{}:{}:{}", self.prefix, entity, id)
    }

    /// Keys for a batch of entity items, in the given id order.
    #[must_use]
    pub fn items(&self, entity: &str, ids: &[u64]) -> Vec<String> {
        ids.iter().map(|&id| self.item(entity, id)).collect()
    }

    /// Key for a custom per-type cache entry.
    #[must_use]
    pub fn custom(&self, entity: &str, tag: &str) -> String {
        format!("{}:{}:{}", self.prefix, entity, tag)
    }
}
