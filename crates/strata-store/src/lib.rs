//! # Strata Store
//!
//! Sharded backing store for the strata access layer: parameterized SQL
//! fragment building, statement-kind dispatch with typed outcomes, and a
//! MySQL implementation with one lazily connected pool per shard.

pub mod outcome;
pub mod query;
pub mod shard;
mod store;

pub use outcome::{statement_kind, QueryOutcome, StatementKind};
pub use query::Params;
pub use shard::{MySqlShardStore, MAX_SHARDS};
pub use store::Store;
