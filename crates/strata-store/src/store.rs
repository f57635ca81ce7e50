//! Backing store abstraction.

use crate::outcome::QueryOutcome;
use crate::query::Params;
use async_trait::async_trait;
use strata_core::StrataResult;

/// Sharded backing store for entity data.
///
/// A single entry point: run a parameterized statement against one shard
/// and get back an outcome shaped by the statement kind. Repositories and
/// tests swap implementations behind this trait.
#[async_trait]
pub trait Store: Send + Sync {
    /// Runs `sql` with named `:name` parameters against the given shard.
    ///
    /// Parameter maps with purely numeric keys (`"0"`, `"1"`, …) are
    /// treated as positional and bound in key order against driver
    /// placeholders already present in the statement.
    async fn query(&self, sql: &str, params: &Params, shard_id: u16) -> StrataResult<QueryOutcome>;
}
