//! Tiered read-through accessor.
//!
//! Resolves a key through Local → Shared → Backing while holding the key's
//! lock for the whole walk, then back-fills the faster tiers with what it
//! found (a value or an absence marker).

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tercet_core::{
    is_unresolvable_key, CacheConfig, CacheValue, CachedEntry, ConfigError, TercetResult, Tier,
    TierRead, ValidationError,
};

use crate::key_lock::KeyLockRegistry;
use crate::stats::{StatsSnapshot, TieredStats};
use crate::traits::{BackingStore, LocalCache, SharedCache};

/// Read-through cache over three tiers with per-key serialization.
///
/// # Guarantees
///
/// - For a given key, at most one `get_value`/`store_value` per lock
///   registry is inside the tier chain at a time. Callers that queue behind
///   the first one are answered by the local tier it populated.
/// - Lookups of distinct keys never wait on each other (with the default
///   per-key lock strategy).
/// - Confirmed absence is cached in the shared and local tiers and surfaces
///   to callers only as `None`.
///
/// No cross-process deduplication is attempted: two processes that miss the
/// shared tier at the same moment each query the backing store once.
///
/// # Type Parameters
///
/// - `V`: the cached value type
/// - `B`: the backing store
/// - `S`: the shared cache
/// - `L`: the local cache
pub struct TieredCache<V, B, S, L>
where
    V: CacheValue,
    B: BackingStore<V>,
    S: SharedCache<V>,
    L: LocalCache<V>,
{
    backing: Arc<B>,
    shared: Arc<S>,
    local: Arc<L>,
    locks: Arc<KeyLockRegistry>,
    config: CacheConfig,
    stats: Arc<TieredStats>,
    _value: PhantomData<fn() -> V>,
}

impl<V, B, S, L> TieredCache<V, B, S, L>
where
    V: CacheValue,
    B: BackingStore<V>,
    S: SharedCache<V>,
    L: LocalCache<V>,
{
    /// Create a new tiered cache.
    ///
    /// Per-key locking uses the process-wide registry; a striped strategy
    /// gets a registry of its own.
    pub fn new(backing: Arc<B>, shared: Arc<S>, local: Arc<L>, config: CacheConfig) -> Self {
        let locks = default_registry(&config);
        Self::with_lock_registry(backing, shared, local, config, locks)
    }

    /// Create a new tiered cache that serializes through `locks`.
    pub fn with_lock_registry(
        backing: Arc<B>,
        shared: Arc<S>,
        local: Arc<L>,
        config: CacheConfig,
        locks: Arc<KeyLockRegistry>,
    ) -> Self {
        Self {
            backing,
            shared,
            local,
            locks,
            config,
            stats: Arc::new(TieredStats::new()),
            _value: PhantomData,
        }
    }

    /// Start building a tiered cache.
    pub fn builder() -> TieredCacheBuilder<V, B, S, L> {
        TieredCacheBuilder::new()
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the backing store.
    pub fn backing(&self) -> &B {
        &self.backing
    }

    /// Get a reference to the shared cache.
    pub fn shared(&self) -> &S {
        &self.shared
    }

    /// Get a reference to the local cache.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// Get the lock registry this cache serializes through.
    pub fn lock_registry(&self) -> &Arc<KeyLockRegistry> {
        &self.locks
    }

    /// Snapshot of the accessor counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve `key` to a value, or `None` if it exists in no tier.
    ///
    /// An empty key returns `None` immediately without taking a lock or
    /// touching any tier. Tier errors are returned unchanged.
    pub async fn get_value(&self, key: &str) -> TercetResult<Option<V>> {
        if is_unresolvable_key(key) {
            self.stats.record_empty_key();
            return Ok(None);
        }

        let guard = self.locks.acquire(key).await;
        let result = self.resolve(key).await;
        guard.release();

        if let Err(e) = &result {
            self.stats.record_error();
            tracing::warn!(key, tier = ?e.tier(), error = %e, "tiered lookup failed");
        }
        result
    }

    /// Walk the tiers. Caller holds the key lock.
    async fn resolve(&self, key: &str) -> TercetResult<Option<V>> {
        match self.local.get(key) {
            TierRead::Found(value) => {
                self.record(key, Tier::Local, false);
                return Ok(Some(value));
            }
            TierRead::ConfirmedAbsent => {
                self.record(key, Tier::Local, true);
                return Ok(None);
            }
            TierRead::Miss => {}
        }

        let (entry, tier) = match self.shared.get(key).await?.into_entry() {
            Some(entry) => (entry, Tier::Shared),
            None => {
                let entry = CachedEntry::from_lookup(self.backing.get(key).await?);
                self.shared.put(key, entry.clone()).await?;
                (entry, Tier::Backing)
            }
        };

        self.local.set(key, entry.clone(), &self.config.local_expiry);
        self.record(key, tier, entry.is_absent());
        Ok(entry.into_value())
    }

    fn record(&self, key: &str, tier: Tier, absent: bool) {
        self.stats.record_resolution(tier, absent);
        tracing::debug!(key, %tier, absent, "tiered lookup resolved");
    }

    /// Write `value` through every tier: Backing, then Shared, then Local.
    ///
    /// Takes the same per-key lock as [`TieredCache::get_value`], so a
    /// concurrent read cannot re-derive an older value from the backing
    /// store in the middle of the write. If a tier fails the remaining,
    /// faster tiers are left untouched.
    ///
    /// # Stale reads after a partial failure
    ///
    /// When the backing write succeeds but the shared write fails, the shared
    /// and local tiers keep whatever they held before, including a cached
    /// absence. Reads keep returning that older result until the local entry
    /// expires (never, under `ExpiryPolicy::Never`) and the shared entry is
    /// replaced. Retrying `store_value` until it succeeds closes the window.
    pub async fn store_value(&self, key: &str, value: V) -> TercetResult<()> {
        if is_unresolvable_key(key) {
            return Err(ValidationError::EmptyKey.into());
        }

        let guard = self.locks.acquire(key).await;
        let result = self.write_through(key, value).await;
        guard.release();

        match &result {
            Ok(()) => {
                self.stats.record_write();
                tracing::debug!(key, "write-through complete");
            }
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(key, tier = ?e.tier(), error = %e, "write-through aborted");
            }
        }
        result
    }

    /// Caller holds the key lock.
    async fn write_through(&self, key: &str, value: V) -> TercetResult<()> {
        self.backing.put(key, value.clone()).await?;
        let entry = CachedEntry::Present(value);
        self.shared.put(key, entry.clone()).await?;
        self.local.set(key, entry, &self.config.local_expiry);
        Ok(())
    }
}

impl<V, B, S, L> Clone for TieredCache<V, B, S, L>
where
    V: CacheValue,
    B: BackingStore<V>,
    S: SharedCache<V>,
    L: LocalCache<V>,
{
    fn clone(&self) -> Self {
        Self {
            backing: Arc::clone(&self.backing),
            shared: Arc::clone(&self.shared),
            local: Arc::clone(&self.local),
            locks: Arc::clone(&self.locks),
            config: self.config,
            stats: Arc::clone(&self.stats),
            _value: PhantomData,
        }
    }
}

impl<V, B, S, L> fmt::Debug for TieredCache<V, B, S, L>
where
    V: CacheValue,
    B: BackingStore<V>,
    S: SharedCache<V>,
    L: LocalCache<V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

fn default_registry(config: &CacheConfig) -> Arc<KeyLockRegistry> {
    match config.lock_strategy {
        tercet_core::LockStrategy::PerKey => KeyLockRegistry::global(),
        strategy => Arc::new(KeyLockRegistry::from_strategy(strategy)),
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder that refuses to produce a partially wired cache.
pub struct TieredCacheBuilder<V, B, S, L> {
    backing: Option<Arc<B>>,
    shared: Option<Arc<S>>,
    local: Option<Arc<L>>,
    config: CacheConfig,
    locks: Option<Arc<KeyLockRegistry>>,
    _value: PhantomData<fn() -> V>,
}

impl<V, B, S, L> TieredCacheBuilder<V, B, S, L>
where
    V: CacheValue,
    B: BackingStore<V>,
    S: SharedCache<V>,
    L: LocalCache<V>,
{
    pub fn new() -> Self {
        Self {
            backing: None,
            shared: None,
            local: None,
            config: CacheConfig::default(),
            locks: None,
            _value: PhantomData,
        }
    }

    pub fn backing_store(mut self, backing: Arc<B>) -> Self {
        self.backing = Some(backing);
        self
    }

    pub fn shared_cache(mut self, shared: Arc<S>) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn local_cache(mut self, local: Arc<L>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Serialize through `locks` instead of the default registry.
    pub fn lock_registry(mut self, locks: Arc<KeyLockRegistry>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Build the cache.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingCollaborator` if any tier was not supplied
    /// - `ConfigError::InvalidValue` if the configuration does not validate
    pub fn build(self) -> TercetResult<TieredCache<V, B, S, L>> {
        let backing = self
            .backing
            .ok_or(ConfigError::MissingCollaborator { tier: Tier::Backing })?;
        let shared = self
            .shared
            .ok_or(ConfigError::MissingCollaborator { tier: Tier::Shared })?;
        let local = self
            .local
            .ok_or(ConfigError::MissingCollaborator { tier: Tier::Local })?;
        self.config.validate()?;

        let locks = self
            .locks
            .unwrap_or_else(|| default_registry(&self.config));
        Ok(TieredCache::with_lock_registry(
            backing,
            shared,
            local,
            self.config,
            locks,
        ))
    }
}

impl<V, B, S, L> Default for TieredCacheBuilder<V, B, S, L>
where
    V: CacheValue,
    B: BackingStore<V>,
    S: SharedCache<V>,
    L: LocalCache<V>,
{
    fn default() -> Self {
        Self::new()
    }
}
