//! Store instrumentation.
//!
//! [`MetricsStore`] sits between the cache and a backing store and reports
//! every entry read, entry write, refresh lock attempt and lock release to a
//! [`MetricsSink`]. Hit ratios, refresh contention and store latency can all
//! be derived from that stream.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use steady_cache::{Cache, MemoryStore, Store};
//! use steady_cache::stores::metrics::{CacheMetric, MetricsSink, MetricsStore};
//!
//! let memory = Arc::new(MemoryStore::default());
//! let store: Arc<dyn Store> = Arc::new(MetricsStore::new(memory, Arc::new(StatsdSink::new())));
//!
//! let cache = Cache::new(store, "reports");
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::lock::DistributedLock;
use crate::store::Store;

/// One observed store operation.
#[derive(Debug, Clone)]
pub enum CacheMetric {
    /// An entry lookup.
    Read {
        /// The key that was read.
        key: String,
        /// Whether the key was found.
        hit: bool,
        /// Whether the store reported an error.
        failed: bool,
        /// Wall time of the call, in milliseconds.
        latency_ms: f64,
        /// `Store::name()` of the wrapped store.
        tier: String,
    },
    /// An entry write after a recomputation.
    Write {
        key: String,
        /// Size of the written value.
        bytes: usize,
        failed: bool,
        latency_ms: f64,
        tier: String,
    },
    /// A refresh lock attempt.
    Lock {
        /// The lock name.
        name: String,
        /// Whether the lock was obtained.
        acquired: bool,
        failed: bool,
        /// Time spent acquiring, including polling.
        latency_ms: f64,
        tier: String,
    },
    /// A refresh lock release.
    Release {
        name: String,
        failed: bool,
        latency_ms: f64,
        tier: String,
    },
}

/// Destination for [`CacheMetric`]s.
///
/// # Example
///
/// ```ignore
/// struct LockContention(AtomicU64);
///
/// #[async_trait]
/// impl MetricsSink for LockContention {
///     fn emit(&self, metric: CacheMetric) {
///         if let CacheMetric::Lock { acquired: false, .. } = metric {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
///
///     async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Record one metric. Runs inline with the store call it describes, so
    /// it must not block.
    fn emit(&self, metric: CacheMetric);

    /// Push out whatever `emit` buffered.
    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A [`Store`] that reports each operation of the store it wraps.
pub struct MetricsStore {
    inner: Arc<dyn Store>,
    sink: Arc<dyn MetricsSink>,
    tier_name: String,
}

impl MetricsStore {
    /// Instrument `inner`. Metrics are tagged with `inner.name()`.
    pub fn new(inner: Arc<dyn Store>, sink: Arc<dyn MetricsSink>) -> Self {
        let tier_name = inner.name().to_string();
        MetricsStore {
            inner,
            sink,
            tier_name,
        }
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[async_trait]
impl Store for MetricsStore {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;
        let latency_ms = elapsed_ms(start);

        self.sink.emit(CacheMetric::Read {
            key: key.to_string(),
            hit: matches!(result, Ok(Some(_))),
            failed: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let bytes = value.len();
        let start = Instant::now();
        let result = self.inner.set(key, value).await;
        let latency_ms = elapsed_ms(start);

        self.sink.emit(CacheMetric::Write {
            key: key.to_string(),
            bytes,
            failed: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    fn lock(
        &self,
        name: &str,
        ttl: Duration,
        blocking_timeout: Duration,
    ) -> Box<dyn DistributedLock> {
        Box::new(MetricsLock {
            inner: self.inner.lock(name, ttl, blocking_timeout),
            sink: self.sink.clone(),
            tier_name: self.tier_name.clone(),
        })
    }
}

struct MetricsLock {
    inner: Box<dyn DistributedLock>,
    sink: Arc<dyn MetricsSink>,
    tier_name: String,
}

#[async_trait]
impl DistributedLock for MetricsLock {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn acquire(&mut self) -> Result<bool, CacheError> {
        let start = Instant::now();
        let result = self.inner.acquire().await;
        let latency_ms = elapsed_ms(start);

        self.sink.emit(CacheMetric::Lock {
            name: self.inner.name().to_string(),
            acquired: matches!(result, Ok(true)),
            failed: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn release(&mut self) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.release().await;
        let latency_ms = elapsed_ms(start);

        self.sink.emit(CacheMetric::Release {
            name: self.inner.name().to_string(),
            failed: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use std::sync::Mutex;

    struct TestSink {
        metrics: Mutex<Vec<CacheMetric>>,
    }

    impl TestSink {
        fn new() -> Self {
            TestSink {
                metrics: Mutex::new(Vec::new()),
            }
        }

        fn take_metrics(&self) -> Vec<CacheMetric> {
            std::mem::take(&mut *self.metrics.lock().unwrap())
        }
    }

    #[async_trait]
    impl MetricsSink for TestSink {
        fn emit(&self, metric: CacheMetric) {
            self.metrics.lock().unwrap().push(metric);
        }

        async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    fn wrapped() -> (MetricsStore, Arc<TestSink>) {
        let inner: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let sink = Arc::new(TestSink::new());
        (MetricsStore::new(inner, sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_read_miss_then_hit() {
        let (store, sink) = wrapped();

        assert!(store.get("key1").await.unwrap().is_none());
        store.set("key1", b"abc".to_vec()).await.unwrap();
        assert!(store.get("key1").await.unwrap().is_some());

        let metrics = sink.take_metrics();
        assert_eq!(metrics.len(), 3);

        match &metrics[0] {
            CacheMetric::Read {
                key,
                hit,
                failed,
                tier,
                latency_ms,
            } => {
                assert_eq!(key, "key1");
                assert!(!hit);
                assert!(!failed);
                assert_eq!(tier, "memory");
                assert!(*latency_ms >= 0.0);
            }
            _ => panic!("Expected Read metric"),
        }
        match &metrics[1] {
            CacheMetric::Write { key, bytes, .. } => {
                assert_eq!(key, "key1");
                assert_eq!(*bytes, 3);
            }
            _ => panic!("Expected Write metric"),
        }
        assert!(matches!(metrics[2], CacheMetric::Read { hit: true, .. }));
    }

    #[tokio::test]
    async fn test_lock_metrics() {
        let (store, sink) = wrapped();
        let ttl = Duration::from_secs(10);

        let mut a = store.lock("lock_k", ttl, Duration::ZERO);
        let mut b = store.lock("lock_k", ttl, Duration::ZERO);
        assert_eq!(a.name(), "lock_k");

        assert!(a.acquire().await.unwrap());
        assert!(!b.acquire().await.unwrap());
        a.release().await.unwrap();

        let metrics = sink.take_metrics();
        assert_eq!(metrics.len(), 3);
        assert!(matches!(metrics[0], CacheMetric::Lock { acquired: true, .. }));
        assert!(matches!(metrics[1], CacheMetric::Lock { acquired: false, failed: false, .. }));
        match &metrics[2] {
            CacheMetric::Release { name, failed, .. } => {
                assert_eq!(name, "lock_k");
                assert!(!failed);
            }
            _ => panic!("Expected Release metric"),
        }
    }
}
