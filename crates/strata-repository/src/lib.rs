//! # Strata Repository
//!
//! Cache-aside entity repositories: typed descriptors with validation
//! rules and lifecycle hooks, batched reads through the item cache with
//! single-query fallthrough, delete-based invalidation on writes, and
//! batch fetch plans that join related entities one batch per step.

pub mod descriptor;
pub mod fetch;
pub mod record;
pub mod registry;
pub mod repository;

pub use descriptor::{conventional_table, EntityDescriptor, FieldRule, Hooks, NoHooks};
pub use fetch::BatchFetchPlan;
pub use record::Record;
pub use registry::{Registry, Shared};
pub use repository::{EntityRepository, Order};
