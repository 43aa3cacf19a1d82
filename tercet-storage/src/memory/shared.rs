use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tercet_core::{CacheValue, CachedEntry, TercetResult, Tier, TierRead};

use super::simulate_latency;
use crate::traits::SharedCache;

/// Byte-oriented map standing in for a remote shared cache.
///
/// Entries are stored encoded, the way a network cache would hold them, so
/// the absence marker goes through the same encoding path as real values.
pub struct InMemorySharedCache<V> {
    entries: DashMap<String, Vec<u8>>,
    latency: Duration,
    _value: PhantomData<fn() -> V>,
}

impl<V: CacheValue> InMemorySharedCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            latency: Duration::ZERO,
            _value: PhantomData,
        }
    }

    /// Delay every `get` and `put` by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Store directly, bypassing simulated latency.
    pub fn seed(&self, key: impl Into<String>, entry: CachedEntry<V>) -> TercetResult<()> {
        let bytes = entry.to_bytes(Tier::Shared)?;
        self.entries.insert(key.into(), bytes);
        Ok(())
    }

    /// Store raw bytes, e.g. to simulate a corrupted or foreign entry.
    pub fn seed_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(key.into(), bytes);
    }

    /// Read directly, bypassing simulated latency.
    pub fn peek(&self, key: &str) -> TercetResult<Option<CachedEntry<V>>> {
        match self.entries.get(key) {
            Some(bytes) => CachedEntry::from_bytes(bytes.value(), Tier::Shared).map(Some),
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<V: CacheValue> Default for InMemorySharedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for InMemorySharedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySharedCache")
            .field("len", &self.entries.len())
            .field("latency", &self.latency)
            .finish()
    }
}

#[async_trait]
impl<V: CacheValue> SharedCache<V> for InMemorySharedCache<V> {
    async fn get(&self, key: &str) -> TercetResult<TierRead<V>> {
        simulate_latency(self.latency).await;
        Ok(TierRead::from(self.peek(key)?))
    }

    async fn put(&self, key: &str, entry: CachedEntry<V>) -> TercetResult<()> {
        simulate_latency(self.latency).await;
        self.seed(key, entry)
    }
}
