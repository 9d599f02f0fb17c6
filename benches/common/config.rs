use std::env;

/// Benchmark settings, read from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Redis URL (REDIS_URL). Redis benchmarks are skipped when unset.
    pub redis_url: Option<String>,

    /// Simulated origin latency in milliseconds (ORIGIN_LATENCY_MS, default 5)
    pub origin_latency_ms: u64,

    /// Number of distinct users (BENCH_USERS, default 1000)
    pub users: usize,

    /// Sample size for benchmarks (BENCH_SAMPLE_SIZE, default 100)
    pub sample_size: usize,
}

fn parsed<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").ok(),
            origin_latency_ms: parsed("ORIGIN_LATENCY_MS", 5),
            users: parsed("BENCH_USERS", 1000),
            sample_size: parsed("BENCH_SAMPLE_SIZE", 100),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        let config = Self::default();
        eprintln!("Benchmark Configuration:");
        eprintln!(
            "  Redis URL: {}",
            config.redis_url.as_deref().unwrap_or("(skipped)")
        );
        eprintln!("  Origin Latency: {}ms", config.origin_latency_ms);
        eprintln!("  Users: {}", config.users);
        eprintln!("  Sample Size: {}", config.sample_size);
        config
    }
}
