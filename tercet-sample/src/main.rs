//! TERCET sample driver
//!
//! Seeds a slow backing store with `key0..key9`, then lets a pool of workers
//! request random keys through a tiered cache and logs how long each request
//! took. The first lookup of each key pays the backing store latency; every
//! later one is answered by the local tier.

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tercet_core::CacheConfig;
use tercet_storage::{InMemoryBackingStore, InMemoryLocalCache, InMemorySharedCache, TieredCache};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const KEY_COUNT: usize = 10;
const BACKING_LATENCY: Duration = Duration::from_millis(500);
const SHARED_LATENCY: Duration = Duration::from_millis(100);

type SampleCache = TieredCache<
    String,
    InMemoryBackingStore<String>,
    InMemorySharedCache<String>,
    InMemoryLocalCache<String>,
>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    init_tracing()?;

    let backing = Arc::new(InMemoryBackingStore::new().with_latency(BACKING_LATENCY));
    for i in 0..KEY_COUNT {
        backing.insert(format!("key{i}"), format!("value{i}"));
    }

    let config = CacheConfig::from_env()?;
    let cache: SampleCache = TieredCache::builder()
        .backing_store(backing)
        .shared_cache(Arc::new(
            InMemorySharedCache::new().with_latency(SHARED_LATENCY),
        ))
        .local_cache(Arc::new(InMemoryLocalCache::new()))
        .config(config)
        .build()?;

    let workers = env_count("TERCET_SAMPLE_WORKERS", 10);
    let requests = env_count("TERCET_SAMPLE_REQUESTS", 50);
    tracing::info!(workers, requests, ?config, "Starting sample run");

    let started = Instant::now();
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let cache = cache.clone();
        handles.push(tokio::spawn(run_worker(worker, requests, cache)));
    }
    for handle in handles {
        handle.await??;
    }

    let stats = cache.stats();
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        lookups = stats.lookups(),
        local_hits = stats.local_hits,
        shared_hits = stats.shared_hits,
        backing_fetches = stats.backing_fetches,
        hit_rate = stats.hit_rate(),
        "Sample run complete"
    );
    Ok(())
}

async fn run_worker(
    worker: usize,
    requests: usize,
    cache: SampleCache,
) -> Result<(), tercet_core::TercetError> {
    for _ in 0..requests {
        let key = format!("key{}", rand::rng().random_range(0..KEY_COUNT));

        let started = Instant::now();
        let value = cache.get_value(&key).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            worker,
            key = %key,
            value = value.as_deref().unwrap_or("<absent>"),
            elapsed_ms,
            "request served"
        );
    }
    Ok(())
}

fn env_count(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(default)
}

fn init_tracing() -> Result<(), Box<dyn Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tercet_storage=debug,tercet_sample=info,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}
