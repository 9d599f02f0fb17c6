//! steady-cache - cache-aside memoization over a shared key/value store
//!
//! This library wraps an expensive computation so that its results are kept
//! in a store shared by many processes:
//! - Results are keyed by the computation's name and its resolved arguments
//! - Results are served for a freshness window (`expires`)
//! - Recomputation of an expired result is serialized by a store-backed lock
//! - Optional stale-while-revalidate: stale results are served while a
//!   background task refreshes them, up to a staleness bound
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use steady_cache::{
//!     Cache, CacheOptions, CallArgs, MemoryStore, Signature, computation_id, from_fn,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Cache::new(Arc::new(MemoryStore::default()), "users");
//!
//!     let profile = cache.wrap(
//!         from_fn(
//!             computation_id!("profile"),
//!             Signature::new().required("id").optional("verbose", false),
//!             |args| async move {
//!                 let id: u64 = args.get("id").map_err(|e| e.to_string())?;
//!                 Ok::<_, String>(format!("profile of {}", id))
//!             },
//!         ),
//!         CacheOptions::new().expires(Duration::from_secs(30)).bg_caching(true),
//!     )?;
//!
//!     // Both calls resolve to {"id": 7, "verbose": false} and share one entry.
//!     let a = profile.call(CallArgs::new().arg(7)).await?;
//!     let b = profile.call(CallArgs::new().kwarg("verbose", false).kwarg("id", 7)).await?;
//!     assert_eq!(a, b);
//!     Ok(())
//! }
//! ```

mod builder;
mod cache;
mod computation;
mod entry;
mod error;
mod key;
mod lock;
mod policy;
mod refresh;
mod registry;
mod store;
pub mod stores;
mod utils;

// Re-export public API
pub use builder::CacheBuilder;
pub use cache::{Cache, CacheOptions, Decorator};
pub use computation::{Computation, FnComputation, from_fn};
pub use entry::{CacheEntry, Freshness};
pub use error::{CacheError, CallError};
pub use key::{BoundArgs, CallArgs, Param, Signature, derive, derive_key};
pub use lock::{DistributedLock, LockGuard};
pub use policy::Cached;
pub use refresh::{RefreshExecutor, RefreshSlot};
pub use registry::{ComputationId, Registry};
pub use store::Store;
pub use stores::memory::{MemoryStore, MemoryStoreConfig};
pub use stores::metrics::{CacheMetric, MetricsSink, MetricsStore};
pub use stores::moka::{MokaStore, MokaStoreConfig};
pub use stores::redis::{RedisStore, RedisStoreConfig};
