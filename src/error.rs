/// Error type for cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A store operation failed.
    #[error("[{tier}] cache error for key '{key}': {message}")]
    Operation {
        tier: String,
        key: String,
        message: String,
    },
    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Two computations resolved to the same registered name.
    #[error(
        "A computation named '{name}' has already been cached elsewhere. \
         Add a prefix to uniquely identify it"
    )]
    NameClash { name: String },
    /// Wrap-time options are unusable.
    #[error("Invalid cache options: {0}")]
    InvalidOptions(String),
    /// Call arguments do not fit the computation's signature.
    #[error("Argument binding failed: {0}")]
    Binding(String),
    /// A lock could not be released by its holder.
    #[error("Lock '{name}': {message}")]
    Lock { name: String, message: String },
}

impl CacheError {
    /// Create a new operation error.
    pub fn operation(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Operation {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new lock error.
    pub fn lock(name: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Lock {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Error returned by a wrapped computation call.
///
/// `Cache` covers failures raised before the computation runs (argument
/// binding). `Computation` carries the computation's own error unchanged.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("{0}")]
    Computation(E),
}

impl<E> CallError<E> {
    /// Returns the computation error, if that is what this is.
    pub fn into_computation(self) -> Option<E> {
        match self {
            CallError::Computation(e) => Some(e),
            CallError::Cache(_) => None,
        }
    }
}
