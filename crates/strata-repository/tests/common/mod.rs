//! In-memory fakes for repository integration tests.
//!
//! `FakeStore` interprets the SQL shapes the repository emits against
//! per-table row maps and counts every query, so tests can assert the
//! single-round-trip behavior. `CountingCache` wraps the in-memory cache
//! with operation counters; `FailingCache` errors on every call.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use strata_cache::{CacheClient, InMemoryCache};
use strata_config::AppConfig;
use strata_core::{StrataError, StrataResult};
use strata_store::{statement_kind, Params, QueryOutcome, StatementKind, Store};

pub const TEST_EPOCH_MS: u64 = 1_262_304_000_000;

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.app.project = "test".to_string();
    config.id.epoch_ms = TEST_EPOCH_MS;
    config
}

pub fn row(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[derive(Default)]
pub struct FakeStore {
    tables: Mutex<HashMap<String, BTreeMap<u64, Params>>>,
    pub queries: AtomicUsize,
    pub log: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Params>) {
        let mut tables = self.tables.lock();
        let entry = tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Some(id) = row.get("id").and_then(Value::as_u64) {
                entry.insert(id, row);
            }
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Params> {
        self.tables
            .lock()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row_by_id(&self, table: &str, id: u64) -> Option<Params> {
        self.tables.lock().get(table).and_then(|rows| rows.get(&id).cloned())
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

fn is_id_param(name: &str) -> bool {
    name.strip_prefix("ID")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// The WHERE targets of a statement: an IN field with its values in
/// placeholder order, plus scalar equality conditions.
struct WhereSpec {
    in_field: Option<String>,
    in_values: Vec<Value>,
    scalars: Vec<(String, Value)>,
}

fn where_spec(sql: &str, params: &Params) -> WhereSpec {
    let mut in_values: Vec<(usize, Value)> = params
        .iter()
        .filter(|(k, _)| is_id_param(k))
        .filter_map(|(k, v)| k[2..].parse::<usize>().ok().map(|n| (n, v.clone())))
        .collect();
    in_values.sort_by_key(|(n, _)| *n);

    let in_field = sql.find(" IN (").and_then(|pos| {
        let head = &sql[..pos];
        let close = head.rfind('`')?;
        let open = head[..close].rfind('`')?;
        Some(head[open + 1..close].to_string())
    });

    let scalars = if sql.contains(" WHERE ") {
        params
            .iter()
            .filter(|(k, _)| !is_id_param(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        Vec::new()
    };

    WhereSpec {
        in_field,
        in_values: in_values.into_iter().map(|(_, v)| v).collect(),
        scalars,
    }
}

fn matches(row: &Params, spec: &WhereSpec) -> bool {
    if let Some(field) = &spec.in_field {
        let value = row.get(field).cloned().unwrap_or(Value::Null);
        if !spec.in_values.contains(&value) {
            return false;
        }
    }
    spec.scalars
        .iter()
        .all(|(field, value)| row.get(field) == Some(value))
}

fn table_after(sql: &str, marker: &str) -> StrataResult<String> {
    let start = sql
        .find(marker)
        .map(|pos| pos + marker.len())
        .ok_or_else(|| StrataError::internal(format!("fake store cannot parse: {sql}")))?;
    let end = sql[start..]
        .find('`')
        .ok_or_else(|| StrataError::internal(format!("fake store cannot parse: {sql}")))?;
    Ok(sql[start..start + end].to_string())
}

#[async_trait]
impl Store for FakeStore {
    async fn query(&self, sql: &str, params: &Params, _shard_id: u16) -> StrataResult<QueryOutcome> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(sql.to_string());

        match statement_kind(sql)? {
            StatementKind::Insert => {
                let table = table_after(sql, "INSERT INTO `")?;
                let mut tables = self.tables.lock();
                let entry = tables.entry(table).or_default();
                let id = params.get("id").and_then(Value::as_u64).unwrap_or(0);
                entry.insert(id, params.clone());
                Ok(QueryOutcome::Affected(1))
            }
            StatementKind::Update => {
                let table = table_after(sql, "UPDATE `")?;
                let mut tables = self.tables.lock();
                let rows = tables.entry(table).or_default();

                // toggle statements flip a 0/1 field in place
                if sql.contains("= IF (") {
                    let field = table_after(sql, "SET `")?;
                    let mut spec = where_spec(sql, params);
                    // the guard binds as :prev_value but targets the toggled field
                    for scalar in &mut spec.scalars {
                        if scalar.0 == "prev_value" {
                            scalar.0 = field.clone();
                        }
                    }
                    let mut affected = 0;
                    for row in rows.values_mut() {
                        if matches(row, &spec) {
                            let current = row.get(&field).and_then(Value::as_i64).unwrap_or(0);
                            row.insert(field.clone(), Value::from(i64::from(current != 1)));
                            affected += 1;
                        }
                    }
                    return Ok(QueryOutcome::Affected(affected));
                }

                let incremental = sql.contains("` + :");
                // non-ID params are SET values here, not conditions
                let mut spec = where_spec(sql, params);
                spec.scalars.clear();
                let mut affected = 0;
                for row in rows.values_mut() {
                    if !matches(row, &spec) {
                        continue;
                    }
                    for (field, value) in params.iter().filter(|(k, _)| !is_id_param(k)) {
                        if incremental {
                            let current = row.get(field).and_then(Value::as_i64).unwrap_or(0);
                            let delta = value.as_i64().unwrap_or(0);
                            row.insert(field.clone(), Value::from(current + delta));
                        } else {
                            row.insert(field.clone(), value.clone());
                        }
                    }
                    affected += 1;
                }
                Ok(QueryOutcome::Affected(affected))
            }
            StatementKind::Delete => {
                let table = table_after(sql, "DELETE FROM `")?;
                let spec = where_spec(sql, params);
                let mut tables = self.tables.lock();
                let rows = tables.entry(table).or_default();
                let before = rows.len();
                rows.retain(|_, row| !matches(row, &spec));
                Ok(QueryOutcome::Affected((before - rows.len()) as u64))
            }
            StatementKind::Select | StatementKind::Describe => {
                let table = table_after(sql, " FROM `")?;
                let spec = where_spec(sql, params);
                let tables = self.tables.lock();
                let selected: Vec<Params> = tables
                    .get(&table)
                    .map(|rows| {
                        rows.values()
                            .filter(|row| matches(row, &spec))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();

                if sql.contains("COUNT(*)") {
                    let mut count_row = Params::new();
                    count_row.insert("count".to_string(), Value::from(selected.len() as u64));
                    return Ok(QueryOutcome::Rows(vec![count_row]));
                }

                let selected = apply_limit(sql, selected);
                Ok(QueryOutcome::Rows(selected))
            }
        }
    }
}

fn apply_limit(sql: &str, rows: Vec<Params>) -> Vec<Params> {
    let Some(pos) = sql.rfind(" LIMIT ") else {
        return rows;
    };
    let tail = sql[pos + " LIMIT ".len()..].trim();
    let (offset, limit) = match tail.split_once(',') {
        Some((o, l)) => (
            o.trim().parse().unwrap_or(0usize),
            l.trim().parse().unwrap_or(usize::MAX),
        ),
        None => (0, tail.parse().unwrap_or(usize::MAX)),
    };
    rows.into_iter().skip(offset).take(limit).collect()
}

/// In-memory cache with per-operation counters.
#[derive(Default)]
pub struct CountingCache {
    inner: InMemoryCache,
    pub multi_gets: AtomicUsize,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn multi_get_count(&self) -> usize {
        self.multi_gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheClient for CountingCache {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_raw(&self, key: &str) -> StrataResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_raw(key).await
    }

    async fn get_many_raw(&self, keys: &[String]) -> StrataResult<HashMap<String, String>> {
        self.multi_gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_many_raw(keys).await
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set_raw(key, value, ttl).await
    }

    async fn add_raw(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<bool> {
        self.inner.add_raw(key, value, ttl).await
    }

    async fn append(&self, key: &str, value: &str) -> StrataResult<bool> {
        self.inner.append(key, value).await
    }

    async fn prepend(&self, key: &str, value: &str) -> StrataResult<bool> {
        self.inner.prepend(key, value).await
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn increment(&self, key: &str, count: i64) -> StrataResult<i64> {
        self.inner.increment(key, count).await
    }

    async fn decrement(&self, key: &str, count: i64) -> StrataResult<i64> {
        self.inner.decrement(key, count).await
    }

    async fn flush(&self) -> StrataResult<()> {
        self.inner.flush().await
    }
}

/// Cache whose transport is down: every operation errors.
pub struct FailingCache;

#[async_trait]
impl CacheClient for FailingCache {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_raw(&self, _key: &str) -> StrataResult<Option<String>> {
        Err(StrataError::cache("cache is down"))
    }

    async fn get_many_raw(&self, _keys: &[String]) -> StrataResult<HashMap<String, String>> {
        Err(StrataError::cache("cache is down"))
    }

    async fn set_raw(&self, _key: &str, _value: &str, _ttl: Duration) -> StrataResult<()> {
        Err(StrataError::cache("cache is down"))
    }

    async fn add_raw(&self, _key: &str, _value: &str, _ttl: Duration) -> StrataResult<bool> {
        Err(StrataError::cache("cache is down"))
    }

    async fn append(&self, _key: &str, _value: &str) -> StrataResult<bool> {
        Err(StrataError::cache("cache is down"))
    }

    async fn prepend(&self, _key: &str, _value: &str) -> StrataResult<bool> {
        Err(StrataError::cache("cache is down"))
    }

    async fn delete(&self, _key: &str) -> StrataResult<bool> {
        Err(StrataError::cache("cache is down"))
    }

    async fn increment(&self, _key: &str, _count: i64) -> StrataResult<i64> {
        Err(StrataError::cache("cache is down"))
    }

    async fn decrement(&self, _key: &str, _count: i64) -> StrataResult<i64> {
        Err(StrataError::cache("cache is down"))
    }

    async fn flush(&self) -> StrataResult<()> {
        Err(StrataError::cache("cache is down"))
    }
}
