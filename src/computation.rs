use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Display;
use std::future::Future;

use crate::key::{BoundArgs, Signature};
use crate::registry::ComputationId;

/// A computation whose results can be cached.
///
/// The computation receives its arguments already resolved against
/// [`signature`](Computation::signature). It should be free of side effects
/// that matter for caching: under lock contention it may run more than once
/// for the same arguments.
#[async_trait]
pub trait Computation: Send + Sync + 'static {
    type Output: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Error: Display + Send + 'static;

    fn id(&self) -> ComputationId;

    fn signature(&self) -> &Signature;

    async fn call(&self, args: BoundArgs) -> Result<Self::Output, Self::Error>;
}

/// A [`Computation`] backed by an async closure.
pub struct FnComputation<F> {
    id: ComputationId,
    signature: Signature,
    f: F,
}

/// Turn an async closure into a [`Computation`].
///
/// # Example
/// ```ignore
/// let lookup = from_fn(
///     computation_id!("lookup_user"),
///     Signature::new().required("id"),
///     |args: BoundArgs| async move {
///         let id: u64 = args.get("id").map_err(|e| e.to_string())?;
///         db.user(id).await
///     },
/// );
/// ```
pub fn from_fn<F, Fut, V, E>(id: ComputationId, signature: Signature, f: F) -> FnComputation<F>
where
    F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    E: Display + Send + 'static,
{
    FnComputation { id, signature, f }
}

#[async_trait]
impl<F, Fut, V, E> Computation for FnComputation<F>
where
    F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    E: Display + Send + 'static,
{
    type Output = V;
    type Error = E;

    fn id(&self) -> ComputationId {
        self.id.clone()
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn call(&self, args: BoundArgs) -> Result<V, E> {
        (self.f)(args).await
    }
}
