//! Batch fetch plans: a root load plus dependent entity joins.
//!
//! A plan loads a root result and then, strictly in declaration order,
//! resolves foreign keys inside it against other repositories. Each step
//! costs the target repository exactly one `get_by_ids` batch, however
//! many rows reference it. Results are `serde_json::Value` trees and
//! merges happen by explicit path walking.

use crate::repository::{EntityRepository, Order};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::pagination::Pagination;
use strata_core::StrataResult;
use strata_store::Params;

struct FetchStep {
    repository: Arc<EntityRepository>,
    src_key: String,
    dst_key: String,
    root_path: Vec<String>,
}

enum RootSource {
    Ids {
        repository: Arc<EntityRepository>,
        ids: Vec<u64>,
    },
    List {
        repository: Arc<EntityRepository>,
        conditions: Params,
        order: Vec<(String, Order)>,
    },
    Data(Value),
}

/// A root load with dependent joins, dispatched sequentially.
pub struct BatchFetchPlan {
    root: RootSource,
    pagination: Option<Pagination>,
    steps: Vec<FetchStep>,
}

impl BatchFetchPlan {
    /// Plan rooted in a batch load of `ids`.
    #[must_use]
    pub fn load(repository: Arc<EntityRepository>, ids: &[u64]) -> Self {
        Self {
            root: RootSource::Ids {
                repository,
                ids: ids.to_vec(),
            },
            pagination: None,
            steps: Vec::new(),
        }
    }

    /// Plan rooted in a list selection.
    #[must_use]
    pub fn load_list(
        repository: Arc<EntityRepository>,
        conditions: Params,
        order: Vec<(String, Order)>,
    ) -> Self {
        Self {
            root: RootSource::List {
                repository,
                conditions,
                order,
            },
            pagination: None,
            steps: Vec::new(),
        }
    }

    /// Plan over an already-loaded result tree.
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self {
            root: RootSource::Data(data),
            pagination: None,
            steps: Vec::new(),
        }
    }

    /// Paginates the root load and wraps the result in a list envelope.
    #[must_use]
    pub fn paginate(mut self, page: u64, limit: u64, total: u64) -> Self {
        self.pagination = Some(Pagination::new(page, limit).with_total(total));
        self
    }

    /// Adds a join step resolving `key_spec` against `repository`.
    ///
    /// `key_spec` names the foreign key; the destination key is derived by
    /// stripping the `_id`-style suffix (`user_id` merges into `user`), or
    /// spelled out explicitly as `src:dst`.
    #[must_use]
    pub fn then(self, repository: Arc<EntityRepository>, key_spec: &str) -> Self {
        self.then_at(repository, "", key_spec)
    }

    /// Adds a join step whose foreign key lives under a dotted path inside
    /// each item. Path segments absent from an item are skipped.
    #[must_use]
    pub fn then_at(
        mut self,
        repository: Arc<EntityRepository>,
        root_path: &str,
        key_spec: &str,
    ) -> Self {
        let (src_key, dst_key) = split_key_spec(key_spec);
        let root_path = if root_path.is_empty() {
            Vec::new()
        } else {
            root_path.split('.').map(ToString::to_string).collect()
        };
        self.steps.push(FetchStep {
            repository,
            src_key,
            dst_key,
            root_path,
        });
        self
    }

    /// Runs the root load and every step, returning the merged tree.
    pub async fn dispatch(mut self) -> StrataResult<Value> {
        let mut data = match self.root {
            RootSource::Data(value) => value,
            RootSource::Ids { repository, ids } => {
                let slice: &[u64] = if let Some(p) = self.pagination.as_mut() {
                    if p.total == 0 {
                        p.set_total(ids.len() as u64);
                    }
                    let start = p.offset() as usize;
                    let end = (start + p.effective_limit() as usize).min(ids.len());
                    ids.get(start..end).unwrap_or(&[])
                } else {
                    &ids
                };
                rows_to_value(repository.get_by_ids(slice).await?)
            }
            RootSource::List {
                repository,
                conditions,
                order,
            } => {
                let order: Vec<(&str, Order)> =
                    order.iter().map(|(f, o)| (f.as_str(), *o)).collect();
                rows_to_value(
                    repository
                        .get_list(conditions, &order, self.pagination.as_mut())
                        .await?,
                )
            }
        };

        if let Some(p) = self.pagination {
            data = json!({
                "items": data,
                "total": p.total,
                "offset": p.offset(),
                "limit": p.effective_limit(),
                "page": p.current_page(),
                "max_page": p.last_page(),
            });
        }

        for step in &self.steps {
            apply_step(&mut data, step).await?;
        }
        Ok(data)
    }
}

fn split_key_spec(spec: &str) -> (String, String) {
    if let Some((src, dst)) = spec.split_once(':') {
        return (src.to_string(), dst.to_string());
    }
    let dst = match spec.rfind('_') {
        Some(pos) => spec[..pos].to_string(),
        None => spec.to_string(),
    };
    (spec.to_string(), dst)
}

fn rows_to_value(rows: Vec<Params>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

/// The items a step walks: the `items` array of a list envelope, the
/// elements of a plain array, or the single object itself.
fn items_of(data: &Value) -> Vec<&Value> {
    match data {
        Value::Object(map) if matches!(map.get("items"), Some(Value::Array(_))) => {
            match map.get("items") {
                Some(Value::Array(items)) => items.iter().collect(),
                _ => Vec::new(),
            }
        }
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn items_of_mut(data: &mut Value) -> Vec<&mut Value> {
    let is_envelope = matches!(
        data,
        Value::Object(map) if matches!(map.get("items"), Some(Value::Array(_)))
    );
    if is_envelope {
        if let Value::Object(map) = data {
            return match map.get_mut("items") {
                Some(Value::Array(items)) => items.iter_mut().collect(),
                _ => Vec::new(),
            };
        }
    }
    match data {
        Value::Array(items) => items.iter_mut().collect(),
        other => vec![other],
    }
}

/// The prefix of `path` that exists in `item`; absent segments end the
/// descent and the walk stays at the last reached node.
fn existing_path(item: &Value, path: &[String]) -> Vec<String> {
    let mut current = item;
    let mut kept = Vec::new();
    for key in path {
        match current.get(key) {
            Some(next) => {
                current = next;
                kept.push(key.clone());
            }
            None => break,
        }
    }
    kept
}

fn pointer_of(path: &[String]) -> String {
    path.iter()
        .map(|key| format!("/{}", key.replace('~', "~0").replace('/', "~1")))
        .collect()
}

fn value_as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(_) => value.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn collect_fk_ids(fk: Option<&Value>, ids: &mut Vec<u64>) {
    match fk {
        // one level of flattening for list-valued foreign keys
        Some(Value::Array(list)) => {
            for value in list {
                if let Some(id) = value_as_id(value) {
                    ids.push(id);
                }
            }
        }
        Some(value) => {
            if let Some(id) = value_as_id(value) {
                ids.push(id);
            }
        }
        None => {}
    }
}

async fn apply_step(data: &mut Value, step: &FetchStep) -> StrataResult<()> {
    // First pass collects the foreign keys so one batch covers every item.
    let mut ids = Vec::new();
    for item in items_of(data) {
        let scope = item
            .pointer(&pointer_of(&existing_path(item, &step.root_path)))
            .unwrap_or(item);
        collect_fk_ids(scope.get(&step.src_key), &mut ids);
    }

    let fetched = step.repository.get_by_ids(&ids).await?;
    let by_id: HashMap<u64, Value> = fetched
        .into_iter()
        .filter_map(|row| {
            row.get("id")
                .and_then(Value::as_u64)
                .map(|id| (id, Value::Object(row)))
        })
        .collect();

    // Second pass merges: scalar key becomes the entity or null, list key
    // becomes the found entities in the key's own order.
    for item in items_of_mut(data) {
        let pointer = pointer_of(&existing_path(item, &step.root_path));
        let Some(scope) = item.pointer_mut(&pointer) else {
            continue;
        };
        let Some(object) = scope.as_object_mut() else {
            continue;
        };

        let merged = match object.get(&step.src_key) {
            Some(Value::Array(list)) => Value::Array(
                list.iter()
                    .filter_map(|value| value_as_id(value))
                    .filter_map(|id| by_id.get(&id).cloned())
                    .collect(),
            ),
            Some(value) => value_as_id(value)
                .and_then(|id| by_id.get(&id).cloned())
                .unwrap_or(Value::Null),
            None => Value::Null,
        };
        object.insert(step.dst_key.clone(), merged);
    }
    Ok(())
}
