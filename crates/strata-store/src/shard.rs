//! MySQL shard store with lazily connected pools.
//!
//! One connection pool per configured shard, created on first use and
//! reused for the process lifetime. Statements carry named `:name`
//! placeholders which are rewritten to driver placeholders before binding.

use crate::outcome::{statement_kind, QueryOutcome, StatementKind};
use crate::query::Params;
use crate::store::Store;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row};
use std::collections::HashMap;
use strata_config::DatabaseConfig;
use strata_core::{StrataError, StrataResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Shard identifiers live in the low 13 bits of composed ids minus the
/// random segment, so 4096 is the hard ceiling.
pub const MAX_SHARDS: u16 = 4096;

/// Sharded MySQL store.
///
/// Pools are created lazily: a shard that is configured but never queried
/// never opens a connection.
pub struct MySqlShardStore {
    config: DatabaseConfig,
    pools: Mutex<HashMap<u16, MySqlPool>>,
}

impl MySqlShardStore {
    /// Creates a store over the given shard configuration. No connections
    /// are opened until the first query.
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pools: Mutex::new(HashMap::new()),
        }
    }

    async fn pool(&self, shard_id: u16) -> StrataResult<MySqlPool> {
        if shard_id >= MAX_SHARDS {
            return Err(StrataError::configuration(format!(
                "shard id {} out of range (max {})",
                shard_id,
                MAX_SHARDS - 1
            )));
        }

        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&shard_id) {
            return Ok(pool.clone());
        }

        let shard = self.config.shard(shard_id).ok_or_else(|| {
            StrataError::configuration(format!("shard {} is not configured", shard_id))
        })?;

        info!(shard_id, host = %shard.host, "connecting shard pool");
        let pool = MySqlPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(self.config.connect_timeout())
            .connect(&shard.url())
            .await?;

        pools.insert(shard_id, pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl Store for MySqlShardStore {
    async fn query(&self, sql: &str, params: &Params, shard_id: u16) -> StrataResult<QueryOutcome> {
        let kind = statement_kind(sql)?;
        let pool = self.pool(shard_id).await?;

        let (rewritten, order) = if is_positional(params) {
            (sql.to_string(), positional_order(params))
        } else {
            rewrite_named(sql)
        };
        debug!(shard_id, sql = %rewritten, "executing statement");

        let mut query = sqlx::query(&rewritten);
        for name in &order {
            let value = params.get(name).unwrap_or(&Value::Null);
            query = bind_value(query, value);
        }

        match kind {
            StatementKind::Insert => {
                let result = query.execute(&pool).await?;
                let id = result.last_insert_id();
                if id != 0 {
                    Ok(QueryOutcome::InsertId(id))
                } else {
                    Ok(QueryOutcome::Affected(result.rows_affected()))
                }
            }
            StatementKind::Update | StatementKind::Delete => {
                let result = query.execute(&pool).await?;
                Ok(QueryOutcome::Affected(result.rows_affected()))
            }
            StatementKind::Select | StatementKind::Describe => {
                let rows = query.fetch_all(&pool).await?;
                Ok(QueryOutcome::Rows(
                    rows.iter().map(row_to_params).collect(),
                ))
            }
        }
    }
}

/// A parameter map whose keys are exactly `"0".."n-1"` binds positionally
/// against placeholders already present in the statement.
fn is_positional(params: &Params) -> bool {
    !params.is_empty()
        && (0..params.len()).all(|i| params.contains_key(&i.to_string()))
}

fn positional_order(params: &Params) -> Vec<String> {
    (0..params.len()).map(|i| i.to_string()).collect()
}

/// Rewrites `:name` placeholders to driver `?` placeholders, returning the
/// rewritten statement and the parameter names in bind order. Quoted
/// literals are left untouched.
fn rewrite_named(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut order = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                out.push(ch);
            }
            ':' if chars
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') =>
            {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push('?');
                order.push(name);
            }
            _ => out.push(ch),
        }
    }

    (out, order)
}

type MySqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>;

fn bind_value<'q>(query: MySqlQuery<'q>, value: &'q Value) -> MySqlQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

/// Decodes a row into a named value map, trying the common MySQL column
/// shapes in order and falling back to null for anything unreadable.
fn row_to_params(row: &MySqlRow) -> Params {
    let mut out = Params::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            v.map_or(Value::Null, Value::from)
        } else if let Ok(v) = row.try_get::<u64, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<bool, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<String, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
            Value::from(String::from_utf8_lossy(&v).into_owned())
        } else {
            Value::Null
        };
        out.insert(column.name().to_string(), value);
    }
    out
}
