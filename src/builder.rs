//! Builder API for creating cache instances.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::refresh::RefreshExecutor;
use crate::registry::Registry;
use crate::store::Store;

/// Builder for creating [`Cache`] instances.
///
/// # Example
///
/// ```ignore
/// use steady_cache::{CacheBuilder, Registry, RedisStore, RedisStoreConfig};
/// use std::sync::Arc;
///
/// let redis = Arc::new(RedisStore::new(RedisStoreConfig::new("redis://localhost:6379")).await?);
/// let registry = Arc::new(Registry::new());
///
/// let reports = CacheBuilder::new(redis.clone())
///     .prefix("reports")
///     .registry(registry.clone())
///     .lock_wait(Duration::from_millis(200))
///     .max_background_refreshes(16)
///     .build();
/// ```
pub struct CacheBuilder {
    store: Arc<dyn Store>,
    prefix: String,
    registry: Option<Arc<Registry>>,
    lock_wait: Duration,
    max_background_refreshes: usize,
}

impl CacheBuilder {
    /// Create a new CacheBuilder over `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        CacheBuilder {
            store,
            prefix: String::new(),
            registry: None,
            lock_wait: Duration::from_millis(100),
            max_background_refreshes: 64,
        }
    }

    /// Default prefix for the names of wrapped computations.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Use `registry` instead of the process-wide [`Registry::global`].
    ///
    /// Caches with separate registries do not see each other's names. Only
    /// give a cache its own registry when its store is not shared with
    /// caches using another one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// How long a call waits for a contended refresh lock before taking the
    /// fallback path.
    pub fn lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Upper bound on background refreshes reserved or running at once.
    /// Zero disables background refresh; stale entries are then refreshed
    /// inline.
    pub fn max_background_refreshes(mut self, max: usize) -> Self {
        self.max_background_refreshes = max;
        self
    }

    /// Build the cache.
    pub fn build(self) -> Cache {
        Cache {
            store: self.store,
            prefix: self.prefix,
            registry: self.registry.unwrap_or_else(Registry::global),
            refresher: RefreshExecutor::new(self.max_background_refreshes),
            lock_wait: self.lock_wait,
        }
    }
}
