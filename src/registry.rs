use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use crate::error::CacheError;
use crate::utils::registered_name;

/// Identity of a computation: the scope that owns it and its identifier.
///
/// Use [`computation_id!`](crate::computation_id) to scope an identifier to
/// the calling module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputationId {
    scope: String,
    ident: String,
}

impl ComputationId {
    pub fn new(scope: impl Into<String>, ident: impl Into<String>) -> Self {
        ComputationId {
            scope: scope.into(),
            ident: ident.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// The name the computation is registered and keyed under.
    pub fn registered_name(&self, prefix: &str) -> String {
        registered_name(prefix, &self.scope, &self.ident)
    }
}

/// Build a [`ComputationId`] scoped to the current module.
///
/// ```ignore
/// let id = computation_id!("daily_report");
/// ```
#[macro_export]
macro_rules! computation_id {
    ($ident:expr) => {
        $crate::ComputationId::new(module_path!(), $ident)
    };
}

static PROCESS_REGISTRY: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// The set of names wrapped so far.
///
/// Two computations registered under the same name would read and overwrite
/// each other's entries, so a second registration of a name is rejected.
/// Caches use [`Registry::global`] unless built with their own registry.
#[derive(Debug, Default)]
pub struct Registry {
    names: Mutex<HashSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// The registry shared by every cache in this process that was not given
    /// one explicitly.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&PROCESS_REGISTRY)
    }

    /// Claim `name`, failing if it is already taken.
    pub fn register(&self, name: &str) -> Result<(), CacheError> {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if !names.insert(name.to_string()) {
            return Err(CacheError::NameClash {
                name: name.to_string(),
            });
        }
        tracing::debug!("Registered cached computation: name={}", name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
