use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::lock::DistributedLock;
use crate::store::Store;
use crate::stores::local_lock::{LocalLock, LockTable};

/// Configuration for MemoryStore.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// How long a contended `acquire` sleeps between attempts.
    pub lock_poll_interval: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        MemoryStoreConfig {
            lock_poll_interval: Duration::from_millis(10),
        }
    }
}

/// Thread-safe in-memory store using HashMap with RwLock.
///
/// Every clone of the `Arc` holding it sees the same values and locks, which
/// makes it a stand-in for a shared store within one process. Nothing is
/// ever evicted; use `MokaStore` when the cache must be bounded.
pub struct MemoryStore {
    state: RwLock<HashMap<String, Vec<u8>>>,
    locks: Arc<LockTable>,
    lock_poll_interval: Duration,
}

impl MemoryStore {
    /// Create a new MemoryStore with the given configuration.
    pub fn new(config: MemoryStoreConfig) -> Self {
        MemoryStore {
            state: RwLock::new(HashMap::new()),
            locks: Arc::new(LockTable::default()),
            lock_poll_interval: config.lock_poll_interval,
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(MemoryStoreConfig::default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let state = self.state.read().await;
        Ok(state.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        state.insert(key.to_string(), value);
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
