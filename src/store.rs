use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;
use crate::lock::DistributedLock;

/// A store is the shared key/value capability the cache is built on.
///
/// It holds encoded [`CacheEntry`](crate::CacheEntry) bytes and hands out
/// named locks. Every client of the same backing store must observe the same
/// values and the same locks, whether it runs in this process or elsewhere.
///
/// Eviction and sizing are the store's business. The cache never deletes
/// entries.
#[async_trait]
pub trait Store: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "memory"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Return the stored bytes.
    ///
    /// The response must be `None` for missing keys.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store the bytes under the given key, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    /// Create a handle to the lock called `name`.
    ///
    /// Creating the handle does not take the lock. `ttl` bounds how long an
    /// acquired lock lives without a release. `blocking_timeout` bounds how
    /// long `acquire` polls before giving up.
    fn lock(&self, name: &str, ttl: Duration, blocking_timeout: Duration)
    -> Box<dyn DistributedLock>;
}
