use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;
use crate::lock::DistributedLock;
use crate::store::Store;
use crate::stores::local_lock::{LocalLock, LockTable};

/// Configuration for MokaStore.
#[derive(Debug, Clone)]
pub struct MokaStoreConfig {
    /// Maximum number of entries the cache can hold.
    pub max_capacity: u64,

    /// Time to live: entries are evicted after this duration from insertion.
    /// `None` means entries are only evicted by the size limit.
    ///
    /// This is store-side retention, independent of a computation's
    /// freshness window. Keep it above the staleness bound so stale entries
    /// stay available to serve during a background refresh.
    pub time_to_live: Option<Duration>,

    /// Time to idle: entries are evicted if not accessed within this duration.
    /// `None` means entries don't expire based on idle time.
    pub time_to_idle: Option<Duration>,

    /// How long a contended `acquire` sleeps between attempts.
    pub lock_poll_interval: Duration,
}

impl Default for MokaStoreConfig {
    fn default() -> Self {
        MokaStoreConfig {
            max_capacity: 10_000,
            time_to_live: None,
            time_to_idle: None,
            lock_poll_interval: Duration::from_millis(10),
        }
    }
}

/// Bounded in-process store using Moka.
///
/// Eviction is left entirely to Moka's size and time policies. An evicted
/// entry reads as a miss.
pub struct MokaStore {
    cache: Cache<String, Arc<Vec<u8>>>,
    locks: Arc<LockTable>,
    lock_poll_interval: Duration,
}

impl MokaStore {
    /// Create a new MokaStore with the given configuration.
    ///
    /// # Example
    /// ```ignore
    /// let config = MokaStoreConfig {
    ///     max_capacity: 10_000,
    ///     time_to_live: Some(Duration::from_secs(300)),
    ///     ..MokaStoreConfig::default()
    /// };
    /// let store = MokaStore::new(config);
    /// ```
    pub fn new(config: MokaStoreConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        MokaStore {
            cache: builder.build(),
            locks: Arc::new(LockTable::default()),
            lock_poll_interval: config.lock_poll_interval,
        }
    }

    /// Get cache statistics (for monitoring/debugging).
    pub fn stats(&self) -> (u64, u64) {
        let entry_count = self.cache.entry_count();
        let weighted_size = self.cache.weighted_size();
        (entry_count, weighted_size)
    }
}

#[async_trait]
impl Store for MokaStore {
    fn name(&self) -> &'static str {
        "moka"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.cache.get(key).await.map(|v| v.as_ref().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), Arc::new(value)).await;
        Ok(())
    }

    fn lock(
        &self,
        name: &str,
        ttl: Duration,
        blocking_timeout: Duration,
    ) -> Box<dyn DistributedLock> {
        Box::new(LocalLock::new(
            self.locks.clone(),
            name,
            ttl,
            blocking_timeout,
            self.lock_poll_interval,
        ))
    }
}
