//! # Strata Core
//!
//! Core types for the strata cache-aside entity access layer: the error
//! taxonomy, the identifier codec and generator, and pagination arithmetic.
//! Higher crates (`strata-cache`, `strata-store`, `strata-repository`)
//! build the cache-aside protocol on top of these.

pub mod alpha;
pub mod error;
pub mod id;
pub mod pagination;
pub mod result;

pub use error::*;
pub use id::{pack_ids, unpack_ids, IdGenerator};
pub use pagination::*;
pub use result::*;
