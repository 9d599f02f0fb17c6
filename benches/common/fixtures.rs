use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use steady_cache::{BoundArgs, Computation, ComputationId, Signature, from_fn};

/// Value produced by the benchmarked computation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub score: u32,
}

impl BenchUser {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            score: (id % 1000) as u32,
        }
    }
}

/// Slow origin that counts its queries
#[derive(Clone)]
pub struct FakeOrigin {
    latency: Duration,
    queries: Arc<AtomicUsize>,
}

impl FakeOrigin {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency: Duration::from_millis(latency_ms),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn user(&self, id: u64) -> BenchUser {
        self.queries.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;
        BenchUser::new(id)
    }

    #[allow(dead_code)]
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    /// A `user(id, verbose=false)` computation over this origin.
    pub fn computation(
        &self,
        ident: &str,
    ) -> impl Computation<Output = BenchUser, Error = String> {
        let origin = self.clone();
        from_fn(
            ComputationId::new("bench", ident),
            user_signature(),
            move |args: BoundArgs| {
                let origin = origin.clone();
                async move {
                    let id: u64 = args.get("id").map_err(|e| e.to_string())?;
                    Ok(origin.user(id).await)
                }
            },
        )
    }
}

pub fn user_signature() -> Signature {
    Signature::new().required("id").optional("verbose", false)
}

/// Picks user ids for different workload patterns
pub struct IdGenerator {
    users: usize,
}

impl IdGenerator {
    pub fn new(users: usize) -> Self {
        Self { users }
    }

    pub fn sequential(&self) -> Vec<u64> {
        (0..self.users as u64).collect()
    }

    /// 80% of requests go to 20% of the users
    pub fn skewed(&self, count: usize) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        let hot = (self.users / 5).max(1);
        (0..count)
            .map(|_| {
                if rng.gen_bool(0.8) || hot == self.users {
                    rng.gen_range(0..hot) as u64
                } else {
                    rng.gen_range(hot..self.users) as u64
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_origin_counts_queries() {
        let origin = FakeOrigin::new(1);
        assert_eq!(origin.user(7).await.id, 7);
        assert_eq!(origin.queries(), 1);
    }

    #[test]
    fn test_id_generator() {
        let ids = IdGenerator::new(100);
        assert_eq!(ids.sequential().len(), 100);

        let skewed = ids.skewed(500);
        assert_eq!(skewed.len(), 500);
        assert!(skewed.iter().all(|id| *id < 100));
    }
}
