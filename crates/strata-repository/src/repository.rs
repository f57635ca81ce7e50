//! Cache-aside entity repository.
//!
//! Reads consult the item cache first and fall through to the backing
//! store in a single batched query; every fetched row is written back to
//! the cache individually. Writes invalidate by deleting the item key,
//! never by overwriting it. Per batch there is at most one cache round
//! trip and one store query.

use crate::descriptor::EntityDescriptor;
use crate::record::Record;
use crate::registry::Shared;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use strata_cache::{CacheClient, CacheExt};
use strata_core::{alpha, StrataError, StrataResult};
use strata_core::pagination::Pagination;
use strata_store::query::{assignment_list, field_list, id_list, where_clause};
use strata_store::{Params, QueryOutcome};
use tracing::{debug, warn};

/// Sort direction for list selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Repository for one entity type.
///
/// Holds the type's descriptor, the shared services, and a request-scoped
/// identity map so repeated single-item lookups share one load.
pub struct EntityRepository {
    descriptor: EntityDescriptor,
    shared: Arc<Shared>,
    identity: Mutex<HashMap<u64, Record>>,
}

impl EntityRepository {
    pub(crate) fn new(descriptor: EntityDescriptor, shared: Arc<Shared>) -> Self {
        Self {
            descriptor,
            shared,
            identity: Mutex::new(HashMap::new()),
        }
    }

    /// The entity type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The entity type descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// A fresh record for a new entity of this type.
    #[must_use]
    pub fn create(&self) -> Record {
        Record::new()
    }

    /// Caching applies only to cacheable types and never in debug mode.
    fn is_cacheable(&self) -> bool {
        self.descriptor.cacheable && !self.shared.debug
    }

    fn item_key(&self, id: u64) -> String {
        self.shared.keys.item(&self.descriptor.name, id)
    }

    async fn run(&self, sql: &str, params: &Params) -> StrataResult<QueryOutcome> {
        self.shared
            .store
            .query(sql, params, self.descriptor.shard_id)
            .await
    }

    fn ensure_declared(&self, field: &str) -> StrataResult<()> {
        if self.descriptor.declares(field) {
            Ok(())
        } else {
            Err(StrataError::configuration(format!(
                "field {:?} is not declared for {}",
                field, self.descriptor.name
            )))
        }
    }

    /// Loads a single record, via the identity map on repeated access.
    ///
    /// Types configured to fail on missing rows get a not-found error
    /// instead of `None`.
    pub async fn get(&self, id: u64) -> StrataResult<Option<Record>> {
        if let Some(record) = self.identity.lock().get(&id) {
            return Ok(Some(record.clone()));
        }

        let rows = self.get_by_ids(&[id]).await?;
        match rows.into_iter().next() {
            Some(row) => {
                let record = Record::persisted(id, row);
                self.identity.lock().insert(id, record.clone());
                Ok(Some(record))
            }
            None if self.descriptor.fail_on_missing => {
                Err(StrataError::not_found(self.descriptor.name.clone(), id))
            }
            None => Ok(None),
        }
    }

    /// Loads a single record or fails with a not-found error.
    pub async fn get_or_fail(&self, id: u64) -> StrataResult<Record> {
        self.get(id)
            .await?
            .ok_or_else(|| StrataError::not_found(self.descriptor.name.clone(), id))
    }

    /// Loads a batch of rows in caller order.
    ///
    /// Duplicates and zero ids are dropped. Cacheable types do one cache
    /// multi-get; all misses are fetched in one store query and written
    /// back to the cache per row. Absent rows are omitted, and every
    /// returned row has been through the `prepare` hook. A cache transport
    /// failure downgrades the whole batch to a miss.
    pub async fn get_by_ids(&self, ids: &[u64]) -> StrataResult<Vec<Params>> {
        let mut wanted = Vec::with_capacity(ids.len());
        let mut seen = HashSet::new();
        for &id in ids {
            if id != 0 && seen.insert(id) {
                wanted.push(id);
            }
        }
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: HashMap<u64, Params> = HashMap::new();
        if self.is_cacheable() {
            let keys = self.shared.keys.items(&self.descriptor.name, &wanted);
            match self.shared.cache.get_many::<Params>(&keys).await {
                Ok(cached) => {
                    debug!(
                        entity = %self.descriptor.name,
                        requested = wanted.len(),
                        hits = cached.len(),
                        "item cache multi-get"
                    );
                    for (_, row) in cached {
                        if let Some(id) = row.get("id").and_then(Value::as_u64) {
                            found.insert(id, row);
                        }
                    }
                }
                Err(err) => {
                    warn!(entity = %self.descriptor.name, %err, "cache read failed, treating batch as a miss");
                }
            }
        }

        let missed: Vec<u64> = wanted
            .iter()
            .copied()
            .filter(|id| !found.contains_key(id))
            .collect();
        if !missed.is_empty() {
            let mut conditions = Params::new();
            conditions.insert("id".to_string(), Value::from(missed));
            let (where_sql, params) = where_clause(conditions);
            let fields: Vec<&str> = self.descriptor.fields.iter().map(String::as_str).collect();
            let sql = format!(
                "SELECT {} FROM `{}` WHERE {}",
                field_list(&fields),
                self.descriptor.table,
                where_sql
            );
            for row in self.run(&sql, &params).await?.into_rows() {
                let Some(id) = row.get("id").and_then(Value::as_u64) else {
                    continue;
                };
                if self.is_cacheable() {
                    // the row is valid either way; a failed write-back only
                    // costs the next read a store hit
                    if let Err(err) = self
                        .shared
                        .cache
                        .set(&self.item_key(id), &row, self.shared.item_ttl)
                        .await
                    {
                        debug!(entity = %self.descriptor.name, id, %err, "cache write-back failed");
                    }
                }
                found.insert(id, row);
            }
        }

        let mut out = Vec::with_capacity(found.len());
        for id in wanted {
            if let Some(mut row) = found.remove(&id) {
                self.descriptor.hooks.prepare(&mut row);
                out.push(row);
            }
        }
        Ok(out)
    }

    /// Saves supplied fields into the record and the store.
    ///
    /// Undeclared fields are dropped; an empty remainder is a no-op.
    /// Validation errors accumulate on the record and abort before any
    /// store or cache mutation, returning `Ok(false)`. Persisted records
    /// are updated by id and their item cache key is deleted; new records
    /// adopt a supplied id or generate one, are inserted, and their unset
    /// declared fields are null-filled. `on_create`/`on_update` fire
    /// before `on_save`, only on success, and `prepare` runs last.
    pub async fn save(&self, record: &mut Record, data: Params) -> StrataResult<bool> {
        let data: Params = data
            .into_iter()
            .filter(|(field, _)| self.descriptor.declares(field))
            .collect();
        record.merge(data.clone());
        if record.data().is_empty() {
            return Ok(false);
        }

        // only the supplied fields travel to the store
        let mut working = data;
        self.validate(record, &mut working);
        if record.has_errors() {
            return Ok(false);
        }

        let was_new = record.is_new();
        let saved;
        if was_new {
            if let Some(id) = working.get("id").and_then(Value::as_u64) {
                record.adopt_id(id);
            }
            if record.id() == 0 {
                if !self.shared.ids.is_enabled() {
                    return Err(StrataError::configuration(
                        "identifier generation is disabled and no id was supplied",
                    ));
                }
                record.adopt_id(self.shared.ids.generate(None));
            }
            working.insert("id".to_string(), Value::from(record.id()));

            let sql = format!(
                "INSERT INTO `{}` SET {}",
                self.descriptor.table,
                assignment_list(&working, ", ", false)
            );
            saved = self.run(&sql, &working).await?.affected() > 0;

            let mut full = Params::new();
            for field in &self.descriptor.fields {
                full.insert(field.clone(), Value::Null);
            }
            for (field, value) in &working {
                full.insert(field.clone(), value.clone());
            }
            *record.data_mut() = full;
        } else {
            // rewriting the key with its current value is a no-op; drop it
            if working.get("id").and_then(Value::as_u64) == Some(record.id()) {
                working.remove("id");
            }
            if working.is_empty() {
                saved = false;
            } else {
                let (in_sql, id_params) = id_list(&[record.id()]);
                let mut params = working.clone();
                for (name, value) in id_params {
                    params.insert(name, value);
                }
                let sql = format!(
                    "UPDATE `{}` SET {} WHERE `id` IN ({})",
                    self.descriptor.table,
                    assignment_list(&working, ", ", false),
                    in_sql
                );
                saved = self.run(&sql, &params).await?.affected() > 0;
            }
            record.set("id", Value::from(record.id()));

            // invalidate, never overwrite: the next read refills the key
            // from the store
            if self.is_cacheable() {
                if let Err(err) = self.shared.cache.delete(&self.item_key(record.id())).await {
                    warn!(entity = %self.descriptor.name, id = record.id(), %err, "cache invalidation failed");
                }
            }
            self.identity.lock().remove(&record.id());
        }

        if saved {
            if was_new {
                self.descriptor.hooks.on_create(record);
            } else {
                self.descriptor.hooks.on_update(record);
            }
            self.descriptor.hooks.on_save(record);
            record.mark_persisted();
        }
        self.descriptor.hooks.prepare(record.data_mut());
        Ok(saved)
    }

    fn validate(&self, record: &mut Record, data: &mut Params) {
        let type_code = self.descriptor.name.to_lowercase();
        for (field, rule) in &self.descriptor.rules {
            if record.is_new() {
                if !data.contains_key(field) {
                    data.insert(field.clone(), Value::Null);
                }
            } else if !data.contains_key(field) {
                // updates only validate the fields they touch
                continue;
            }

            let result = rule(data.get(field).unwrap_or(&Value::Null));

            // a null that passed through was never really supplied
            if data.get(field) == Some(&Value::Null) {
                data.remove(field);
            }

            if let Err(code) = result {
                record.add_error(format!("e_{}_{}_{}", type_code, field, code));
            }
        }
    }

    /// Deletes the record's row; on success fires `on_delete` and resets
    /// the record to the new state.
    pub async fn delete(&self, record: &mut Record) -> StrataResult<u64> {
        let deleted = self.delete_by_ids(&[record.id()]).await?;
        if deleted > 0 {
            self.descriptor.hooks.on_delete();
            record.reset();
        }
        Ok(deleted)
    }

    /// Deletes rows by id, invalidating their item cache keys.
    pub async fn delete_by_ids(&self, ids: &[u64]) -> StrataResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conditions = Params::new();
        conditions.insert("id".to_string(), Value::from(ids.to_vec()));
        let (where_sql, params) = where_clause(conditions);
        let sql = format!("DELETE FROM `{}` WHERE {}", self.descriptor.table, where_sql);
        let deleted = self.run(&sql, &params).await?.affected();

        if deleted > 0 {
            if self.is_cacheable() {
                for &id in ids {
                    if let Err(err) = self.shared.cache.delete(&self.item_key(id)).await {
                        warn!(entity = %self.descriptor.name, id, %err, "cache invalidation failed");
                    }
                }
            }
            let mut identity = self.identity.lock();
            for id in ids {
                identity.remove(id);
            }
        }
        Ok(deleted)
    }

    /// Deletes rows matching AND-joined conditions.
    ///
    /// The removed ids are unknown here, so the item cache is not
    /// invalidated; prefer [`delete_by_ids`](Self::delete_by_ids) for
    /// cacheable types.
    pub async fn delete_by(&self, conditions: Params) -> StrataResult<u64> {
        if conditions.is_empty() {
            return Ok(0);
        }
        let (where_sql, params) = where_clause(conditions);
        let sql = format!("DELETE FROM `{}` WHERE {}", self.descriptor.table, where_sql);
        Ok(self.run(&sql, &params).await?.affected())
    }

    /// Deletes rows whose `field` is in `values`. No cache invalidation,
    /// as with [`delete_by`](Self::delete_by).
    pub async fn delete_by_field_values(
        &self,
        field: &str,
        values: Vec<Value>,
    ) -> StrataResult<u64> {
        self.ensure_declared(field)?;
        if values.is_empty() {
            return Ok(0);
        }
        let mut conditions = Params::new();
        conditions.insert(field.to_string(), Value::Array(values));
        self.delete_by(conditions).await
    }

    /// Adds counter deltas to rows by id (`field = field + delta`).
    /// Counter writes bypass the item cache.
    pub async fn increment(&self, counters: &Params, ids: &[u64]) -> StrataResult<u64> {
        if counters.is_empty() || ids.is_empty() {
            return Ok(0);
        }
        let (in_sql, id_params) = id_list(ids);
        let mut params = counters.clone();
        for (name, value) in id_params {
            params.insert(name, value);
        }
        let sql = format!(
            "UPDATE `{}` SET {} WHERE `id` IN ({})",
            self.descriptor.table,
            assignment_list(counters, ", ", true),
            in_sql
        );
        Ok(self.run(&sql, &params).await?.affected())
    }

    /// Adds counter deltas to one record's row.
    pub async fn increment_record(&self, record: &Record, counters: &Params) -> StrataResult<u64> {
        self.increment(counters, &[record.id()]).await
    }

    /// Adds counter deltas to every row of the type.
    pub async fn increment_all(&self, counters: &Params) -> StrataResult<u64> {
        if counters.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE `{}` SET {}",
            self.descriptor.table,
            assignment_list(counters, ", ", true)
        );
        Ok(self.run(&sql, counters).await?.affected())
    }

    /// Flips a 0/1 column, optionally only when it still holds
    /// `prev_value`. Bypasses the item cache like the counter writes.
    pub async fn toggle(&self, field: &str, id: u64, prev_value: Option<i64>) -> StrataResult<u64> {
        self.ensure_declared(field)?;
        let mut params = Params::new();
        params.insert("id".to_string(), Value::from(id));
        let mut sql = format!(
            "UPDATE `{}` SET `{field}` = IF (`{field}` = 1, 0, 1) WHERE `id` = :id",
            self.descriptor.table
        );
        if let Some(prev) = prev_value {
            sql.push_str(&format!(" AND `{field}` = :prev_value"));
            params.insert("prev_value".to_string(), Value::from(prev));
        }
        Ok(self.run(&sql, &params).await?.affected())
    }

    /// Counts rows matching AND-joined conditions.
    pub async fn count(&self, conditions: Params) -> StrataResult<u64> {
        let (where_sql, params) = where_clause(conditions);
        let where_part = if where_sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {where_sql}")
        };
        let sql = format!(
            "SELECT COUNT(*) AS `count` FROM `{}`{} LIMIT 1",
            self.descriptor.table, where_part
        );
        let rows = self.run(&sql, &params).await?.into_rows();
        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    /// Selects a page of rows matching `conditions`, ordered.
    ///
    /// Only ids are selected from the store; the rows themselves funnel
    /// through [`get_by_ids`](Self::get_by_ids) so cached items are reused.
    /// When a pagination is given its total is filled in from a COUNT
    /// query unless already set.
    pub async fn get_list(
        &self,
        conditions: Params,
        order: &[(&str, Order)],
        mut pagination: Option<&mut Pagination>,
    ) -> StrataResult<Vec<Params>> {
        for (field, _) in order {
            self.ensure_declared(field)?;
        }

        let mut total = pagination.as_ref().map_or(0, |p| p.total);
        if total == 0 {
            total = self.count(conditions.clone()).await?;
        }

        let mut limit_sql = String::new();
        if let Some(p) = pagination.as_deref_mut() {
            p.set_total(total);
            let limit = p.effective_limit();
            if limit > 0 {
                limit_sql = format!(" LIMIT {}, {}", p.offset(), limit);
            }
        }
        if total == 0 {
            return Ok(Vec::new());
        }

        let order_sql = if order.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = order
                .iter()
                .map(|(field, dir)| format!("`{}` {}", field, dir.as_sql()))
                .collect();
            format!(" ORDER BY {}", parts.join(", "))
        };
        let (where_sql, params) = where_clause(conditions);
        let where_part = if where_sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {where_sql}")
        };
        let sql = format!(
            "SELECT `id` FROM `{}`{}{}{}",
            self.descriptor.table, where_part, order_sql, limit_sql
        );

        let ids: Vec<u64> = self
            .run(&sql, &params)
            .await?
            .into_rows()
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_u64))
            .collect();
        self.get_by_ids(&ids).await
    }

    /// Runs a caller-supplied query tail (`JOIN … WHERE …`) paginated.
    ///
    /// Fills the pagination total from a COUNT pass when unset, then
    /// selects the page directly from the store; the item cache is not
    /// consulted. Rows go through `prepare`.
    pub async fn get_paginated(
        &self,
        query_tail: &str,
        params: &Params,
        pagination: &mut Pagination,
    ) -> StrataResult<Vec<Params>> {
        if pagination.total == 0 {
            let sql = format!(
                "SELECT COUNT(*) AS `count` FROM `{}` {} LIMIT 0, 1",
                self.descriptor.table, query_tail
            );
            let rows = self.run(&sql, params).await?.into_rows();
            let total = rows
                .first()
                .and_then(|row| row.get("count"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            pagination.set_total(total);
        }
        if pagination.total == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM `{}` {} LIMIT {}, {}",
            self.descriptor.table,
            query_tail,
            pagination.offset(),
            pagination.effective_limit()
        );
        let mut rows = self.run(&sql, params).await?.into_rows();
        for row in &mut rows {
            self.descriptor.hooks.prepare(row);
        }
        Ok(rows)
    }

    async fn select_by_field(&self, field: &str, values: Vec<Value>) -> StrataResult<Vec<Params>> {
        self.ensure_declared(field)?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut conditions = Params::new();
        conditions.insert(field.to_string(), Value::Array(values));
        let (where_sql, params) = where_clause(conditions);
        let fields: Vec<&str> = self.descriptor.fields.iter().map(String::as_str).collect();
        let sql = format!(
            "SELECT {} FROM `{}` WHERE {}",
            field_list(&fields),
            self.descriptor.table,
            where_sql
        );
        Ok(self.run(&sql, &params).await?.into_rows())
    }

    /// Selects raw rows whose `field` is in `values`, keyed by id.
    /// Bypasses the item cache and the `prepare` hook.
    pub async fn get_by_fields(
        &self,
        field: &str,
        values: Vec<Value>,
    ) -> StrataResult<HashMap<u64, Params>> {
        let rows = self.select_by_field(field, values).await?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(id) = row.get("id").and_then(Value::as_u64) {
                out.insert(id, row);
            }
        }
        Ok(out)
    }

    /// Selects the first raw row whose `field` equals `value`.
    pub async fn get_by_field(&self, field: &str, value: Value) -> StrataResult<Option<Params>> {
        let rows = self.select_by_field(field, vec![value]).await?;
        Ok(rows.into_iter().next())
    }

    /// Computes a per-type value through the custom cache.
    ///
    /// On a hit the cached value is returned; on a miss the fetcher runs
    /// and its result is written back. Debug mode and uncacheable types go
    /// straight to the fetcher.
    pub async fn cached<T, F, Fut>(&self, tag: &str, fetcher: F) -> StrataResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = StrataResult<T>> + Send,
    {
        if !self.is_cacheable() {
            return fetcher().await;
        }
        let key = self.shared.keys.custom(&self.descriptor.name, tag);
        self.shared
            .cache
            .get_or_set(&key, self.shared.item_ttl, fetcher)
            .await
    }

    /// Loads a record by its string-encoded identifier.
    pub async fn get_by_alpha_id(&self, text: &str) -> StrataResult<Option<Record>> {
        let id = alpha::decode(text, &self.shared.alphabet)?;
        self.get(id).await
    }

    /// The string-encoded identifier of a record.
    pub fn alpha_id(&self, record: &Record) -> StrataResult<String> {
        alpha::encode(record.id(), &self.shared.alphabet)
    }
}
