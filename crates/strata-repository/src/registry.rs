//! Shared services and the repository registry.
//!
//! Repositories receive their collaborators through the constructor; the
//! registry is plain data handed around explicitly, not process-global
//! state.

use crate::descriptor::EntityDescriptor;
use crate::repository::EntityRepository;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_cache::{CacheClient, CacheKeys};
use strata_config::AppConfig;
use strata_core::id::IdGenerator;
use strata_store::Store;

/// Services every repository shares: the backing store, the cache client,
/// key patterns, the identifier generator and codec alphabet, and the
/// debug switch that bypasses caching.
pub struct Shared {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn CacheClient>,
    pub keys: CacheKeys,
    pub ids: IdGenerator,
    pub alphabet: String,
    pub item_ttl: Duration,
    pub debug: bool,
}

/// Holds one repository per registered entity type.
pub struct Registry {
    shared: Arc<Shared>,
    repositories: HashMap<String, Arc<EntityRepository>>,
}

impl Registry {
    /// Creates a registry over a store and cache, configured from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheClient>, config: &AppConfig) -> Self {
        let shared = Shared {
            store,
            cache,
            keys: CacheKeys::new(config.app.project.clone()),
            ids: IdGenerator::new(config.id.epoch_ms),
            alphabet: config.id.alphabet.clone(),
            item_ttl: config.cache.default_ttl(),
            debug: config.app.debug,
        };
        Self {
            shared: Arc::new(shared),
            repositories: HashMap::new(),
        }
    }

    /// The shared services handed to every repository.
    #[must_use]
    pub fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Registers an entity type and returns its repository.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> Arc<EntityRepository> {
        let repository = Arc::new(EntityRepository::new(descriptor, Arc::clone(&self.shared)));
        self.repositories
            .insert(repository.name().to_string(), Arc::clone(&repository));
        repository
    }

    /// Looks up the repository for a registered type name.
    #[must_use]
    pub fn repository(&self, name: &str) -> Option<Arc<EntityRepository>> {
        self.repositories.get(name).cloned()
    }
}
