//! Result type alias for strata.

use crate::StrataError;

/// A specialized `Result` type for strata operations.
pub type StrataResult<T> = Result<T, StrataError>;
