//! Entity type descriptors: declared fields, validation rules, hooks.
//!
//! Table and field metadata is declared explicitly per type rather than
//! introspected from the store at runtime. [`conventional_table`] derives
//! the conventional relation name for descriptor authors who follow it.

use crate::record::Record;
use serde_json::Value;
use std::sync::Arc;
use strata_store::Params;

/// Per-field validation rule.
///
/// Returns `Ok(())` for a valid value or a short error code which the
/// repository expands to `e_{type}_{field}_{code}` on the record.
pub type FieldRule = fn(&Value) -> Result<(), &'static str>;

/// Entity lifecycle hooks.
///
/// `prepare` post-processes every row a read returns, before the caller
/// sees it; the write hooks fire only after a successful store mutation,
/// `on_create`/`on_update` before `on_save`.
pub trait Hooks: Send + Sync {
    fn prepare(&self, _row: &mut Params) {}
    fn on_create(&self, _record: &mut Record) {}
    fn on_update(&self, _record: &mut Record) {}
    fn on_save(&self, _record: &mut Record) {}
    fn on_delete(&self) {}
}

/// Hook set that does nothing, the default for plain entities.
pub struct NoHooks;

impl Hooks for NoHooks {}

/// Derives the conventional relation name for an entity type name:
/// lower-cased with `::` separators turned into underscores.
#[must_use]
pub fn conventional_table(type_name: &str) -> String {
    strata_store::query::table_name(type_name, false)
}

/// Static description of one entity type.
#[derive(Clone)]
pub struct EntityDescriptor {
    /// Entity type name, used in cache keys, error codes and not-found errors.
    pub name: String,
    /// Backing relation name.
    pub table: String,
    /// Declared fields; only these are ever read or written. Must include `id`.
    pub fields: Vec<String>,
    /// Whether reads of this type go through the item cache.
    pub cacheable: bool,
    /// Shard this type's rows live on.
    pub shard_id: u16,
    /// Per-field validation rules, run in declaration order.
    pub rules: Vec<(String, FieldRule)>,
    /// Lifecycle hooks.
    pub hooks: Arc<dyn Hooks>,
    /// When set, single-item lookups turn absence into a not-found error.
    pub fail_on_missing: bool,
}

impl EntityDescriptor {
    /// Creates a descriptor with the conventional table name, no rules and
    /// no hooks. Caching is on by default.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        let name = name.into();
        Self {
            table: conventional_table(&name),
            fields: fields.iter().map(ToString::to_string).collect(),
            cacheable: true,
            shard_id: 0,
            rules: Vec::new(),
            hooks: Arc::new(NoHooks),
            fail_on_missing: false,
            name,
        }
    }

    /// Overrides the backing relation name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Disables the item cache for this type.
    #[must_use]
    pub fn uncached(mut self) -> Self {
        self.cacheable = false;
        self
    }

    /// Routes this type's rows to a shard.
    #[must_use]
    pub fn shard(mut self, shard_id: u16) -> Self {
        self.shard_id = shard_id;
        self
    }

    /// Adds a validation rule for a field.
    #[must_use]
    pub fn rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.push((field.into(), rule));
        self
    }

    /// Installs lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Makes single-item lookups fail on absence instead of returning none.
    #[must_use]
    pub fn fail_on_missing(mut self) -> Self {
        self.fail_on_missing = true;
        self
    }

    /// True when `field` is declared for this type.
    #[must_use]
    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_table() {
        assert_eq!(conventional_table("Blog::Post"), "blog_post");
    }

    #[test]
    fn test_descriptor_defaults() {
        let desc = EntityDescriptor::new("User", &["id", "name"]);
        assert_eq!(desc.table, "user");
        assert!(desc.cacheable);
        assert!(desc.declares("name"));
        assert!(!desc.declares("password"));
    }

    #[test]
    fn test_builder_overrides() {
        let desc = EntityDescriptor::new("User", &["id"])
            .table("member")
            .uncached()
            .shard(3);
        assert_eq!(desc.table, "member");
        assert!(!desc.cacheable);
        assert_eq!(desc.shard_id, 3);
    }
}
