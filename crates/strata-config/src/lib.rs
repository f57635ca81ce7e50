//! # Strata Config
//!
//! Layered configuration for the strata access layer: cache endpoint,
//! shard map, and identifier generation settings.

pub mod app_config;
pub mod loader;

pub use app_config::*;
pub use loader::ConfigLoader;
