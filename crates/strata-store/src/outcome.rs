//! Statement kind dispatch and query outcomes.

use crate::query::Params;
use strata_core::{StrataError, StrataResult};

/// The statement kinds the store knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
    Describe,
}

/// Classifies a statement by its first keyword.
///
/// Any other keyword is a configuration error: the store has no way to
/// shape a result for it.
pub fn statement_kind(sql: &str) -> StrataResult<StatementKind> {
    let keyword = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();
    match keyword.as_str() {
        "insert" => Ok(StatementKind::Insert),
        "update" => Ok(StatementKind::Update),
        "delete" => Ok(StatementKind::Delete),
        "select" => Ok(StatementKind::Select),
        "describe" => Ok(StatementKind::Describe),
        other => Err(StrataError::configuration(format!(
            "undefined query kind: {:?}",
            other
        ))),
    }
}

/// Typed result of a dispatched statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// INSERT: the store-generated identifier, when one was produced.
    InsertId(u64),
    /// INSERT without a generated id, UPDATE, DELETE: affected row count.
    Affected(u64),
    /// SELECT/DESCRIBE: ordered row maps.
    Rows(Vec<Params>),
}

impl QueryOutcome {
    /// Affected row count; rows answer with their length.
    #[must_use]
    pub fn affected(&self) -> u64 {
        match self {
            Self::InsertId(_) => 1,
            Self::Affected(n) => *n,
            Self::Rows(rows) => rows.len() as u64,
        }
    }

    /// The generated insert id, or 0 when none was produced.
    #[must_use]
    pub const fn insert_id(&self) -> u64 {
        match self {
            Self::InsertId(id) => *id,
            _ => 0,
        }
    }

    /// Consumes the outcome into its rows; non-row outcomes are empty.
    #[must_use]
    pub fn into_rows(self) -> Vec<Params> {
        match self {
            Self::Rows(rows) => rows,
            _ => Vec::new(),
        }
    }
}
