//! The caching policy applied to every call of a wrapped computation.
//!
//! | entry            | lock     | outcome                                        |
//! |------------------|----------|------------------------------------------------|
//! | fresh            | -        | cached result                                  |
//! | stale, bg mode   | acquired | cached result, refresh in the background       |
//! | other            | acquired | recompute, store, release, fresh result        |
//! | stale, bg mode   | busy     | cached result                                  |
//! | other            | busy     | recompute live, nothing stored                 |
//!
//! "stale" means older than `expires` but younger than `stale`. Entries past
//! the staleness bound are treated like missing ones.

use std::sync::Arc;
use std::time::Duration;

use crate::computation::Computation;
use crate::entry::{CacheEntry, Freshness};
use crate::error::{CacheError, CallError};
use crate::key::{BoundArgs, CallArgs, derive_key};
use crate::lock::LockGuard;
use crate::refresh::{RefreshExecutor, RefreshSlot};
use crate::store::Store;
use crate::utils::{duration_ms, lock_name, now_ms};

/// Timing and mode settings of one wrapped computation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Policy {
    pub(crate) expires: Duration,
    pub(crate) stale: Duration,
    pub(crate) bg_caching: bool,
    pub(crate) lock_wait: Duration,
}

impl Policy {
    fn classify<V>(&self, entry: &CacheEntry<V>) -> Freshness {
        Freshness::classify(
            entry.age_ms(now_ms()),
            duration_ms(self.expires),
            duration_ms(self.stale),
        )
    }
}

/// A computation wrapped with the caching policy.
///
/// Cloning is cheap; clones share the computation, store and refresh
/// executor.
pub struct Cached<C: Computation> {
    name: Arc<str>,
    computation: Arc<C>,
    store: Arc<dyn Store>,
    refresher: RefreshExecutor,
    policy: Policy,
}

impl<C: Computation> Clone for Cached<C> {
    fn clone(&self) -> Self {
        Cached {
            name: Arc::clone(&self.name),
            computation: Arc::clone(&self.computation),
            store: Arc::clone(&self.store),
            refresher: self.refresher.clone(),
            policy: self.policy,
        }
    }
}

impl<C: Computation> Cached<C> {
    pub(crate) fn new(
        name: String,
        computation: C,
        store: Arc<dyn Store>,
        refresher: RefreshExecutor,
        policy: Policy,
    ) -> Self {
        Cached {
            name: name.into(),
            computation: Arc::new(computation),
            store,
            refresher,
            policy,
        }
    }

    /// The registered name, which prefixes every key of this computation.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expires(&self) -> Duration {
        self.policy.expires
    }

    pub fn stale(&self) -> Duration {
        self.policy.stale
    }

    pub fn bg_caching(&self) -> bool {
        self.policy.bg_caching
    }

    /// The cache key a call with `args` reads and writes.
    pub fn key_for(&self, args: CallArgs) -> Result<String, CacheError> {
        let bound = self.computation.signature().bind(args)?;
        Ok(derive_key(&self.name, &bound))
    }

    /// Call the computation through the cache.
    pub async fn call(&self, args: CallArgs) -> Result<C::Output, CallError<C::Error>> {
        let bound = self.computation.signature().bind(args)?;
        let key = derive_key(&self.name, &bound);

        let cached = self
            .read_entry(&key)
            .await
            .map(|entry| {
                let freshness = self.policy.classify(&entry);
                (entry, freshness)
            });

        if let Some((entry, Freshness::Fresh)) = cached {
            tracing::debug!("Serving fresh entry: key={}", key);
            return Ok(entry.result);
        }

        let mut lock = self.store.lock(
            &lock_name(&key),
            self.policy.expires,
            self.policy.lock_wait,
        );
        let acquired = match lock.acquire().await {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::warn!(
                    "Lock acquisition failed, treating as contended: key={}, error={}",
                    key,
                    e
                );
                false
            }
        };

        if !acquired {
            return match cached {
                Some((entry, Freshness::Stale)) if self.policy.bg_caching => {
                    tracing::debug!("Refresh in progress elsewhere, serving stale entry: key={}", key);
                    Ok(entry.result)
                }
                _ => {
                    tracing::debug!("Refresh lock busy, computing without caching: key={}", key);
                    self.computation
                        .call(bound)
                        .await
                        .map_err(CallError::Computation)
                }
            };
        }

        let guard = LockGuard::new(lock);

        if let Some((entry, Freshness::Stale)) = cached
            && self.policy.bg_caching
        {
            match self.refresher.try_reserve() {
                Some(slot) => {
                    self.spawn_refresh(slot, key, bound, guard);
                    return Ok(entry.result);
                }
                None => tracing::warn!(
                    "No background refresh slot available, refreshing inline: key={}",
                    key
                ),
            }
        }

        let result = recompute(self.computation.as_ref(), self.store.as_ref(), &key, bound).await;
        guard.release().await;
        result.map_err(CallError::Computation)
    }

    /// Read and decode the entry for `key`. Store failures and undecodable
    /// entries count as misses.
    async fn read_entry(&self, key: &str) -> Option<CacheEntry<C::Output>> {
        let data = match self.store.get(key).await {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read failed, treating as miss: key={}, error={}", key, e);
                return None;
            }
        };

        match CacheEntry::decode(&data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Unreadable cache entry, treating as miss: key={}, error={}", key, e);
                None
            }
        }
    }

    /// Refresh `key` on the executor. The task owns the lock and releases it
    /// whatever the outcome.
    fn spawn_refresh(&self, slot: RefreshSlot, key: String, bound: BoundArgs, guard: LockGuard) {
        let computation = Arc::clone(&self.computation);
        let store = Arc::clone(&self.store);

        tracing::debug!("Serving stale entry, refreshing in background: key={}", key);
        slot.spawn(async move {
            match recompute(computation.as_ref(), store.as_ref(), &key, bound).await {
                Ok(_) => tracing::debug!("Background refresh completed: key={}", key),
                Err(e) => tracing::warn!("Background refresh failed: key={}, error={}", key, e),
            }
            guard.release().await;
        });
    }
}

/// Run the computation and store its result under `key`.
///
/// The entry is stamped when the computation finishes. A failed write is
/// logged and the result still returned.
async fn recompute<C: Computation>(
    computation: &C,
    store: &dyn Store,
    key: &str,
    args: BoundArgs,
) -> Result<C::Output, C::Error> {
    let entry = CacheEntry::new(computation.call(args).await?);

    match entry.encode() {
        Ok(data) => {
            if let Err(e) = store.set(key, data).await {
                tracing::warn!("Cache write failed: key={}, error={}", key, e);
            }
        }
        Err(e) => tracing::warn!("Result not cacheable: key={}, error={}", key, e),
    }

    Ok(entry.result)
}
