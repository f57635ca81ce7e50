//! Parameterized SQL fragment building.
//!
//! Fragments carry named `:name` placeholders; the shard store rewrites
//! them to driver placeholders and binds the values. Identifiers are
//! backtick-quoted throughout.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Named parameter map for a statement.
pub type Params = serde_json::Map<String, Value>;

/// Builds a SET-style assignment list: `` `name` = :name `` joined by `sep`.
///
/// With `incremental` set, assignments add to the current column value
/// (`` `name` = `name` + :name ``), used for counter updates.
#[must_use]
pub fn assignment_list(params: &Params, sep: &str, incremental: bool) -> String {
    params
        .keys()
        .map(|name| {
            if incremental {
                format!("`{name}` = `{name}` + :{name}")
            } else {
                format!("`{name}` = :{name}")
            }
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// Builds a backtick-quoted field list for SELECT clauses.
#[must_use]
pub fn field_list(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds a WHERE clause from a condition map, AND-joined.
///
/// Scalar conditions become `` `name` = :name ``. List conditions are
/// expanded into synthetically named `ID1..IDn` parameters and an `IN`
/// list; an empty list becomes `` `name` = NULL `` (matches nothing).
///
/// Returns the fragment and the expanded parameter map. List entries are
/// replaced by their synthetic parameters, so the returned map, not the
/// original conditions, must be bound to the statement. The synthetic
/// counter runs across the whole clause so two list conditions never
/// collide.
#[must_use]
pub fn where_clause(conditions: Params) -> (String, Params) {
    let mut clauses = Vec::new();
    let mut params = Params::new();
    let mut counter = 0usize;

    for (field, value) in conditions {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    clauses.push(format!("`{field}` = NULL"));
                } else {
                    let mut names = Vec::with_capacity(items.len());
                    for item in items {
                        counter += 1;
                        let name = format!("ID{counter}");
                        names.push(format!(":{name}"));
                        params.insert(name, item);
                    }
                    clauses.push(format!("`{field}` IN ({})", names.join(", ")));
                }
            }
            scalar => {
                clauses.push(format!("`{field}` = :{field}"));
                params.insert(field, scalar);
            }
        }
    }

    (clauses.join(" AND "), params)
}

/// Builds an `IN`-list fragment for a batch of ids: `:ID1, :ID2, …` plus
/// the matching parameter map.
#[must_use]
pub fn id_list(ids: &[u64]) -> (String, Params) {
    let mut names = Vec::with_capacity(ids.len());
    let mut params = Params::new();
    for (i, &id) in ids.iter().enumerate() {
        let name = format!("ID{}", i + 1);
        names.push(format!(":{name}"));
        params.insert(name, Value::from(id));
    }
    (names.join(", "), params)
}

static TABLE_NAMES: Lazy<Mutex<HashMap<String, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Derives the backing relation name from an entity type name: lower-cased,
/// `::` separators replaced with underscores. Memoized for the process
/// lifetime; `debug` bypasses the memo and recomputes every call.
#[must_use]
pub fn table_name(type_name: &str, debug: bool) -> String {
    let derive = || type_name.replace("::", "_").to_lowercase();
    if debug {
        return derive();
    }
    TABLE_NAMES
        .lock()
        .entry(type_name.to_string())
        .or_insert_with(derive)
        .clone()
}
