use async_trait::async_trait;

use crate::error::CacheError;

/// A named mutual-exclusion token shared by every client of a store.
///
/// Locks carry a TTL so that a holder which never releases (crash, hang)
/// stops blocking others once the TTL runs out.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// The lock's name in the store.
    fn name(&self) -> &str;

    /// Try to take the lock, polling for at most the blocking timeout the
    /// lock was created with.
    ///
    /// `Ok(false)` means another holder has it. That is an expected outcome,
    /// not an error.
    async fn acquire(&mut self) -> Result<bool, CacheError>;

    /// Give the lock up.
    ///
    /// Fails if this handle does not hold the lock any more, e.g. because its
    /// TTL ran out and another client took it.
    async fn release(&mut self) -> Result<(), CacheError>;
}

/// An acquired lock that is released on every exit path.
///
/// [`release`](LockGuard::release) is the normal way out. A guard dropped
/// without being released (panic, cancelled future) hands the release to the
/// current Tokio runtime.
pub struct LockGuard {
    lock: Option<Box<dyn DistributedLock>>,
}

impl LockGuard {
    /// Wrap a lock whose `acquire` already returned `true`.
    pub fn new(lock: Box<dyn DistributedLock>) -> Self {
        LockGuard { lock: Some(lock) }
    }

    pub fn name(&self) -> &str {
        self.lock.as_ref().map(|l| l.name()).unwrap_or_default()
    }

    /// Release the lock. Failures are logged; a lock that cannot be released
    /// expires with its TTL.
    pub async fn release(mut self) {
        if let Some(mut lock) = self.lock.take() {
            release_logged(lock.as_mut()).await;
        }
    }
}

async fn release_logged(lock: &mut dyn DistributedLock) {
    match lock.release().await {
        Ok(()) => tracing::debug!("Released lock: name={}", lock.name()),
        Err(e) => tracing::warn!("Failed to release lock: name={}, error={}", lock.name(), e),
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(mut lock) = self.lock.take() else {
            return;
        };

        tracing::warn!("Lock guard dropped without release: name={}", lock.name());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release_logged(lock.as_mut()).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    "No runtime to release lock on, leaving it to expire: name={}",
                    lock.name()
                );
            }
        }
    }
}
