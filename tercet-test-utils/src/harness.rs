//! Recorder-backed accessor fixture.

use std::sync::Arc;
use std::time::Duration;

use tercet_core::{CacheConfig, CacheValue, CachedEntry, ExpiryPolicy};
use tercet_storage::{KeyLockRegistry, LocalCache, TieredCache};

use crate::recording::{RecordingBackingStore, RecordingLocalCache, RecordingSharedCache};

/// Accessor wired to recording collaborators.
pub type RecordingCache<V> =
    TieredCache<V, RecordingBackingStore<V>, RecordingSharedCache<V>, RecordingLocalCache<V>>;

/// A `TieredCache` plus handles to each of its recording tiers.
///
/// Every harness gets its own lock registry so tests running in parallel
/// never contend on each other's keys.
pub struct Harness<V: CacheValue> {
    pub backing: Arc<RecordingBackingStore<V>>,
    pub shared: Arc<RecordingSharedCache<V>>,
    pub local: Arc<RecordingLocalCache<V>>,
    pub locks: Arc<KeyLockRegistry>,
    pub cache: RecordingCache<V>,
}

impl<V: CacheValue> Harness<V> {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self::assemble(
            RecordingBackingStore::new(),
            RecordingSharedCache::new(),
            RecordingLocalCache::new(),
            config,
        )
    }

    /// Backing and shared tiers delay every call, to widen race windows.
    pub fn with_latency(backing: Duration, shared: Duration) -> Self {
        Self::assemble(
            RecordingBackingStore::with_latency(backing),
            RecordingSharedCache::with_latency(shared),
            RecordingLocalCache::new(),
            CacheConfig::default(),
        )
    }

    fn assemble(
        backing: RecordingBackingStore<V>,
        shared: RecordingSharedCache<V>,
        local: RecordingLocalCache<V>,
        config: CacheConfig,
    ) -> Self {
        let backing = Arc::new(backing);
        let shared = Arc::new(shared);
        let local = Arc::new(local);
        let locks = Arc::new(KeyLockRegistry::from_strategy(config.lock_strategy));
        let cache = TieredCache::with_lock_registry(
            Arc::clone(&backing),
            Arc::clone(&shared),
            Arc::clone(&local),
            config,
            Arc::clone(&locks),
        );
        Self {
            backing,
            shared,
            local,
            locks,
            cache,
        }
    }

    /// A second accessor over the same shared and backing tiers but with its
    /// own local cache and lock registry, as another process would have.
    pub fn sibling_process(&self) -> (Arc<RecordingLocalCache<V>>, RecordingCache<V>) {
        let local = Arc::new(RecordingLocalCache::new());
        let cache = TieredCache::with_lock_registry(
            Arc::clone(&self.backing),
            Arc::clone(&self.shared),
            Arc::clone(&local),
            *self.cache.config(),
            Arc::new(KeyLockRegistry::per_key()),
        );
        (local, cache)
    }

    /// Put `value` in the backing store only.
    pub fn prime_backing(&self, key: &str, value: V) {
        self.backing.inner().insert(key, value);
    }

    /// Put `value` in the shared cache only.
    pub fn prime_shared(&self, key: &str, value: V) {
        // Encoding a value the harness itself chose cannot fail for the
        // value types used in tests.
        if let Err(e) = self.shared.inner().seed(key, CachedEntry::Present(value)) {
            panic!("failed to prime shared tier: {e}");
        }
    }

    /// Put `value` in the local cache only, without counting the call.
    pub fn prime_local(&self, key: &str, value: V) {
        self.local
            .inner()
            .set(key, CachedEntry::Present(value), &ExpiryPolicy::Never);
    }

    /// Put `value` in every tier.
    pub fn prime_all(&self, key: &str, value: V) {
        self.prime_backing(key, value.clone());
        self.prime_shared(key, value.clone());
        self.prime_local(key, value);
    }

    /// Clear every call counter.
    pub fn reset_counts(&self) {
        self.backing.reset_counts();
        self.shared.reset_counts();
        self.local.reset_counts();
    }

    /// Total number of calls made against any tier.
    pub fn total_tier_calls(&self) -> usize {
        self.backing.counts().total() + self.shared.counts().total() + self.local.counts().total()
    }
}

impl<V: CacheValue> Default for Harness<V> {
    fn default() -> Self {
        Self::new()
    }
}
