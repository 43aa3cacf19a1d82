//! Recording collaborators.
//!
//! Each recorder wraps the matching in-memory tier, counts every call the
//! accessor makes against it, and can be told to fail on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tercet_core::{CacheValue, CachedEntry, ExpiryPolicy, TercetError, TercetResult, Tier, TierRead};
use tercet_storage::{
    BackingStore, InMemoryBackingStore, InMemoryLocalCache, InMemorySharedCache, LocalCache,
    SharedCache,
};

/// Number of reads and writes a tier has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub gets: usize,
    pub puts: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.gets + self.puts
    }
}

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicUsize,
    puts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
}

impl Counters {
    fn counts(&self) -> CallCounts {
        CallCounts {
            gets: self.gets.load(Ordering::SeqCst),
            puts: self.puts.load(Ordering::SeqCst),
        }
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, tier: Tier, op: &str) -> TercetResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(TercetError::tier_failed(tier, format!("injected {op} failure")))
        } else {
            Ok(())
        }
    }

    fn reset(&self) {
        self.gets.store(0, Ordering::SeqCst);
        self.puts.store(0, Ordering::SeqCst);
        self.max_in_flight.store(0, Ordering::SeqCst);
    }
}

// ============================================================================
// BACKING STORE
// ============================================================================

/// Backing store that counts calls and can fail on demand.
#[derive(Debug)]
pub struct RecordingBackingStore<V> {
    inner: InMemoryBackingStore<V>,
    counters: Counters,
}

impl<V: CacheValue> RecordingBackingStore<V> {
    pub fn new() -> Self {
        Self::wrap(InMemoryBackingStore::new())
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self::wrap(InMemoryBackingStore::new().with_latency(latency))
    }

    pub fn wrap(inner: InMemoryBackingStore<V>) -> Self {
        Self {
            inner,
            counters: Counters::default(),
        }
    }

    pub fn inner(&self) -> &InMemoryBackingStore<V> {
        &self.inner
    }

    pub fn counts(&self) -> CallCounts {
        self.counters.counts()
    }

    /// Highest number of `get` calls that were running at the same time.
    pub fn max_concurrent_gets(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self, fail: bool) {
        self.counters.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.counters.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn reset_counts(&self) {
        self.counters.reset();
    }
}

impl<V: CacheValue> Default for RecordingBackingStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: CacheValue> BackingStore<V> for RecordingBackingStore<V> {
    async fn get(&self, key: &str) -> TercetResult<Option<V>> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.counters
            .check(&self.counters.fail_gets, Tier::Backing, "get")?;
        self.counters.enter();
        let result = self.inner.get(key).await;
        self.counters.exit();
        result
    }

    async fn put(&self, key: &str, value: V) -> TercetResult<()> {
        self.counters.puts.fetch_add(1, Ordering::SeqCst);
        self.counters
            .check(&self.counters.fail_puts, Tier::Backing, "put")?;
        self.inner.put(key, value).await
    }
}

// ============================================================================
// SHARED CACHE
// ============================================================================

/// Shared cache that counts calls, logs every `put`, and can fail on demand.
#[derive(Debug)]
pub struct RecordingSharedCache<V> {
    inner: InMemorySharedCache<V>,
    counters: Counters,
    puts: Mutex<Vec<(String, CachedEntry<V>)>>,
}

impl<V: CacheValue> RecordingSharedCache<V> {
    pub fn new() -> Self {
        Self::wrap(InMemorySharedCache::new())
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self::wrap(InMemorySharedCache::new().with_latency(latency))
    }

    pub fn wrap(inner: InMemorySharedCache<V>) -> Self {
        Self {
            inner,
            counters: Counters::default(),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &InMemorySharedCache<V> {
        &self.inner
    }

    pub fn counts(&self) -> CallCounts {
        self.counters.counts()
    }

    /// Every successful `put`, in call order.
    pub fn put_log(&self) -> Vec<(String, CachedEntry<V>)> {
        self.puts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fail_gets(&self, fail: bool) {
        self.counters.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.counters.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn reset_counts(&self) {
        self.counters.reset();
        self.puts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<V: CacheValue> Default for RecordingSharedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: CacheValue> SharedCache<V> for RecordingSharedCache<V> {
    async fn get(&self, key: &str) -> TercetResult<TierRead<V>> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.counters
            .check(&self.counters.fail_gets, Tier::Shared, "get")?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, entry: CachedEntry<V>) -> TercetResult<()> {
        self.counters.puts.fetch_add(1, Ordering::SeqCst);
        self.counters
            .check(&self.counters.fail_puts, Tier::Shared, "put")?;
        self.inner.put(key, entry.clone()).await?;
        self.puts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((key.to_string(), entry));
        Ok(())
    }
}

// ============================================================================
// LOCAL CACHE
// ============================================================================

/// Local cache that counts calls and records the expiry policy of every `set`.
#[derive(Debug)]
pub struct RecordingLocalCache<V> {
    inner: InMemoryLocalCache<V>,
    counters: Counters,
    policies: Mutex<Vec<ExpiryPolicy>>,
}

impl<V: CacheValue> RecordingLocalCache<V> {
    pub fn new() -> Self {
        Self::wrap(InMemoryLocalCache::new())
    }

    pub fn wrap(inner: InMemoryLocalCache<V>) -> Self {
        Self {
            inner,
            counters: Counters::default(),
            policies: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &InMemoryLocalCache<V> {
        &self.inner
    }

    /// `gets` counts reads, `puts` counts sets.
    pub fn counts(&self) -> CallCounts {
        self.counters.counts()
    }

    /// Expiry policy passed with each `set`, in call order.
    pub fn policies(&self) -> Vec<ExpiryPolicy> {
        self.policies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset_counts(&self) {
        self.counters.reset();
        self.policies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<V: CacheValue> Default for RecordingLocalCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: CacheValue> LocalCache<V> for RecordingLocalCache<V> {
    fn get(&self, key: &str) -> TierRead<V> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: &str, entry: CachedEntry<V>, policy: &ExpiryPolicy) {
        self.counters.puts.fetch_add(1, Ordering::SeqCst);
        self.policies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*policy);
        self.inner.set(key, entry, policy);
    }
}
