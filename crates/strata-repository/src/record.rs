//! Entity record: identifier, field map, and accumulated validation errors.

use serde_json::Value;
use std::collections::BTreeSet;
use strata_store::Params;

/// One entity row being read or edited.
///
/// An id of 0 is the "new" sentinel: the record has not been persisted and
/// a save will insert rather than update. Validation failures accumulate as
/// error codes on the record instead of aborting with an error; callers
/// check [`errors`](Self::errors) after a save.
#[derive(Debug, Clone, Default)]
pub struct Record {
    id: u64,
    data: Params,
    is_new: bool,
    errors: BTreeSet<String>,
}

impl Record {
    /// Creates an empty record for a new entity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: 0,
            data: Params::new(),
            is_new: true,
            errors: BTreeSet::new(),
        }
    }

    /// Creates a record over an already-persisted row.
    #[must_use]
    pub fn persisted(id: u64, data: Params) -> Self {
        Self {
            id,
            data,
            is_new: false,
            errors: BTreeSet::new(),
        }
    }

    /// The entity identifier, 0 while unpersisted.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// True while the record has never been persisted.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// A field value, if set.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Sets a field value in the working copy. The store is not touched
    /// until the next save.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.data.insert(field.into(), value);
    }

    /// Removes and returns a field value.
    pub fn take(&mut self, field: &str) -> Option<Value> {
        self.data.remove(field)
    }

    /// The full field map.
    #[must_use]
    pub const fn data(&self) -> &Params {
        &self.data
    }

    /// Consumes the record into its field map.
    #[must_use]
    pub fn into_data(self) -> Params {
        self.data
    }

    /// Accumulated validation error codes, ordered.
    #[must_use]
    pub const fn errors(&self) -> &BTreeSet<String> {
        &self.errors
    }

    /// True when any validation error has accumulated.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Clears accumulated validation errors.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub(crate) fn add_error(&mut self, code: String) {
        self.errors.insert(code);
    }

    pub(crate) fn adopt_id(&mut self, id: u64) {
        self.id = id;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    pub(crate) fn merge(&mut self, data: Params) {
        for (field, value) in data {
            self.data.insert(field, value);
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut Params {
        &mut self.data
    }

    pub(crate) fn reset(&mut self) {
        self.id = 0;
        self.data.clear();
        self.is_new = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record_sentinel() {
        let record = Record::new();
        assert_eq!(record.id(), 0);
        assert!(record.is_new());
        assert!(!record.has_errors());
    }

    #[test]
    fn test_field_access() {
        let mut record = Record::new();
        record.set("name", json!("alice"));
        assert_eq!(record.get("name"), Some(&json!("alice")));
        assert_eq!(record.take("name"), Some(json!("alice")));
        assert_eq!(record.get("name"), None);
    }

    #[test]
    fn test_reset_after_delete() {
        let mut record = Record::persisted(5, Params::new());
        assert!(!record.is_new());
        record.reset();
        assert_eq!(record.id(), 0);
        assert!(record.is_new());
    }
}
