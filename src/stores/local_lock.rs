//! Token-based lock table for stores that live in this process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::lock::DistributedLock;
use crate::utils::deadline_after;

struct Holder {
    token: String,
    expires_at: Instant,
}

/// Lock state shared by every handle created from one store.
#[derive(Default)]
pub(crate) struct LockTable {
    held: Mutex<HashMap<String, Holder>>,
}

impl LockTable {
    async fn try_acquire(&self, name: &str, token: &str, ttl: Duration) -> bool {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        // Holders whose TTL ran out without a release.
        held.retain(|_, holder| holder.expires_at > now);
        if held.contains_key(name) {
            return false;
        }

        held.insert(
            name.to_string(),
            Holder {
                token: token.to_string(),
                expires_at: deadline_after(now, ttl),
            },
        );
        true
    }

    async fn release(&self, name: &str, token: &str) -> Result<(), CacheError> {
        let mut held = self.held.lock().await;

        match held.get(name) {
            Some(holder) if holder.token == token => {
                let expired = holder.expires_at <= Instant::now();
                held.remove(name);
                if expired {
                    return Err(CacheError::lock(name, "expired before release"));
                }
                Ok(())
            }
            _ => Err(CacheError::lock(name, "not held by this handle")),
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.held.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_held(&self, name: &str) -> bool {
        let held = self.held.lock().await;
        held.get(name)
            .is_some_and(|holder| holder.expires_at > Instant::now())
    }
}

/// A lock handle on a [`LockTable`].
pub(crate) struct LocalLock {
    table: Arc<LockTable>,
    name: String,
    token: String,
    ttl: Duration,
    blocking_timeout: Duration,
    poll_interval: Duration,
}

impl LocalLock {
    pub(crate) fn new(
        table: Arc<LockTable>,
        name: &str,
        ttl: Duration,
        blocking_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        LocalLock {
            table,
            name: name.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            ttl,
            blocking_timeout,
            poll_interval,
        }
    }
}

#[async_trait]
impl DistributedLock for LocalLock {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&mut self) -> Result<bool, CacheError> {
        let deadline = deadline_after(Instant::now(), self.blocking_timeout);

        loop {
            if self.table.try_acquire(&self.name, &self.token, self.ttl).await {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn release(&mut self) -> Result<(), CacheError> {
        self.table.release(&self.name, &self.token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(5);

    fn handle(table: &Arc<LockTable>, ttl_ms: u64, wait_ms: u64) -> LocalLock {
        LocalLock::new(
            table.clone(),
            "lock_k",
            Duration::from_millis(ttl_ms),
            Duration::from_millis(wait_ms),
            POLL,
        )
    }

    #[tokio::test]
    async fn test_mutual_exclusion() {
        let table = Arc::new(LockTable::default());
        let mut first = handle(&table, 10_000, 20);
        let mut second = handle(&table, 10_000, 20);

        assert!(first.acquire().await.unwrap());
        assert!(!second.acquire().await.unwrap());

        first.release().await.unwrap();
        assert!(second.acquire().await.unwrap());
        assert!(table.is_held("lock_k").await);
        second.release().await.unwrap();
        assert!(!table.is_held("lock_k").await);
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_released_within_timeout() {
        let table = Arc::new(LockTable::default());
        let mut first = handle(&table, 10_000, 0);
        assert!(first.acquire().await.unwrap());

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            first.release().await.unwrap();
        });

        let mut second = handle(&table, 10_000, 500);
        assert!(second.acquire().await.unwrap());
        releaser.await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_over() {
        let table = Arc::new(LockTable::default());
        let mut first = handle(&table, 30, 0);
        let mut second = handle(&table, 10_000, 0);

        assert!(first.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(second.acquire().await.unwrap());

        // The former holder must not free the new holder's lock.
        assert!(matches!(first.release().await, Err(CacheError::Lock { .. })));
        assert!(table.is_held("lock_k").await);
        second.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_release_fails() {
        let table = Arc::new(LockTable::default());
        let mut lock = handle(&table, 10_000, 0);

        assert!(lock.acquire().await.unwrap());
        lock.release().await.unwrap();
        assert!(lock.release().await.is_err());
    }

    #[tokio::test]
    async fn test_expired_holders_are_dropped() {
        let table = Arc::new(LockTable::default());
        let mut abandoned = LocalLock::new(
            table.clone(),
            "lock_abandoned",
            Duration::from_millis(20),
            Duration::ZERO,
            POLL,
        );
        assert!(abandoned.acquire().await.unwrap());
        assert_eq!(table.len().await, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        let mut other = handle(&table, 10_000, 0);
        assert!(other.acquire().await.unwrap());

        assert_eq!(table.len().await, 1);
        assert!(!table.is_held("lock_abandoned").await);
        other.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_unbounded_ttl_and_wait() {
        let table = Arc::new(LockTable::default());
        let mut first = LocalLock::new(table.clone(), "lock_k", Duration::MAX, Duration::MAX, POLL);
        let mut second = handle(&table, 10_000, 20);

        assert!(first.acquire().await.unwrap());
        assert!(!second.acquire().await.unwrap());
        first.release().await.unwrap();
        assert!(second.acquire().await.unwrap());
        second.release().await.unwrap();
    }
}
