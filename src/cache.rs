use std::sync::Arc;
use std::time::Duration;

use crate::builder::CacheBuilder;
use crate::computation::Computation;
use crate::error::CacheError;
use crate::policy::{Cached, Policy};
use crate::refresh::RefreshExecutor;
use crate::registry::Registry;
use crate::store::Store;

/// Per-computation cache settings.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// How long a result is served without recomputation.
    ///
    /// Also the TTL of the refresh lock. Default: 5 seconds.
    pub expires: Duration,

    /// Overrides the cache's prefix for this computation.
    pub prefix: Option<String>,

    /// Serve stale results while a background task refreshes them.
    pub bg_caching: bool,

    /// How old a result may get and still be served while a refresh is
    /// outstanding. `None` (or zero) means twice `expires`.
    pub stale: Option<Duration>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            expires: Duration::from_secs(5),
            prefix: None,
            bg_caching: false,
            stale: None,
        }
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        CacheOptions::default()
    }

    pub fn expires(mut self, expires: Duration) -> Self {
        self.expires = expires;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn bg_caching(mut self, enabled: bool) -> Self {
        self.bg_caching = enabled;
        self
    }

    pub fn stale(mut self, stale: Duration) -> Self {
        self.stale = Some(stale);
        self
    }

    /// The staleness bound in effect.
    pub fn stale_bound(&self) -> Duration {
        match self.stale {
            Some(stale) if !stale.is_zero() => stale,
            _ => self.expires.saturating_mul(2),
        }
    }

    fn validate(&self) -> Result<(), CacheError> {
        if self.expires.is_zero() {
            return Err(CacheError::InvalidOptions(
                "expires must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Entry point for caching computations in one store.
///
/// # Example
///
/// ```ignore
/// let cache = Cache::new(Arc::new(MemoryStore::default()), "reports");
///
/// let daily = cache.wrap(
///     from_fn(computation_id!("daily"), Signature::new().required("day"), |args| async move {
///         build_report(args.get::<String>("day")?).await
///     }),
///     CacheOptions::new().expires(Duration::from_secs(60)).bg_caching(true),
/// )?;
///
/// let report = daily.call(CallArgs::new().arg("2024-05-01")).await?;
/// ```
#[derive(Clone)]
pub struct Cache {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) prefix: String,
    pub(crate) registry: Arc<Registry>,
    pub(crate) refresher: RefreshExecutor,
    pub(crate) lock_wait: Duration,
}

impl Cache {
    /// Create a cache over `store` with default engine settings.
    pub fn new(store: Arc<dyn Store>, prefix: impl Into<String>) -> Self {
        CacheBuilder::new(store).prefix(prefix).build()
    }

    pub fn builder(store: Arc<dyn Store>) -> CacheBuilder {
        CacheBuilder::new(store)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The executor running this cache's background refreshes.
    pub fn refresher(&self) -> &RefreshExecutor {
        &self.refresher
    }

    /// Fix the options for the next computation to wrap.
    pub fn options(&self, options: CacheOptions) -> Decorator {
        Decorator {
            cache: self.clone(),
            options,
        }
    }

    /// Wrap `computation` with `options`.
    pub fn wrap<C: Computation>(
        &self,
        computation: C,
        options: CacheOptions,
    ) -> Result<Cached<C>, CacheError> {
        self.options(options).wrap(computation)
    }
}

/// Options bound to a cache, applicable to exactly one computation.
pub struct Decorator {
    cache: Cache,
    options: CacheOptions,
}

impl Decorator {
    /// Register the computation's name and wrap it.
    ///
    /// Fails if the options are unusable, the signature repeats a parameter,
    /// or another computation already registered the same name.
    pub fn wrap<C: Computation>(self, computation: C) -> Result<Cached<C>, CacheError> {
        let Decorator { cache, options } = self;
        options.validate()?;
        computation.signature().validate()?;

        let prefix = options.prefix.as_deref().unwrap_or(&cache.prefix);
        let name = computation.id().registered_name(prefix);
        cache.registry.register(&name)?;

        let policy = Policy {
            expires: options.expires,
            stale: options.stale_bound(),
            bg_caching: options.bg_caching,
            lock_wait: cache.lock_wait,
        };

        Ok(Cached::new(
            name,
            computation,
            cache.store,
            cache.refresher,
            policy,
        ))
    }
}
