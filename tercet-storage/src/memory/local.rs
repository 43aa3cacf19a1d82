use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tercet_core::{CacheValue, CachedEntry, ExpiryPolicy, TierRead};

use crate::traits::LocalCache;

/// Concurrent expiring map for the in-process tier.
///
/// Each instance is owned by whoever creates it; there is no shared default
/// instance, so two caches never see each other's entries.
pub struct InMemoryLocalCache<V> {
    entries: DashMap<String, Slot<V>>,
}

struct Slot<V> {
    entry: CachedEntry<V>,
    policy: ExpiryPolicy,
    expires_at: Option<Instant>,
}

impl<V> Slot<V> {
    fn new(entry: CachedEntry<V>, policy: ExpiryPolicy, now: Instant) -> Self {
        Self {
            entry,
            policy,
            expires_at: deadline(&policy, now),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Renew a sliding entry after a read.
    fn touch(&mut self, now: Instant) {
        if self.policy.is_sliding() {
            self.expires_at = deadline(&self.policy, now);
        }
    }
}

fn deadline(policy: &ExpiryPolicy, now: Instant) -> Option<Instant> {
    policy.ttl().and_then(|ttl: Duration| now.checked_add(ttl))
}

impl<V: CacheValue> InMemoryLocalCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store an entry that never expires.
    pub fn seed(&self, key: impl Into<String>, entry: CachedEntry<V>) {
        self.entries
            .insert(key.into(), Slot::new(entry, ExpiryPolicy::Never, Instant::now()));
    }

    /// Read without renewing a sliding entry. Expired entries read as `None`.
    pub fn peek(&self, key: &str) -> Option<CachedEntry<V>> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.entry.clone())
    }

    pub fn remove(&self, key: &str) -> Option<CachedEntry<V>> {
        self.entries.remove(key).map(|(_, slot)| slot.entry)
    }

    /// Drop every expired entry now instead of waiting for it to be read.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet purged.
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

impl<V: CacheValue> Default for InMemoryLocalCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for InMemoryLocalCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLocalCache")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<V: CacheValue> LocalCache<V> for InMemoryLocalCache<V> {
    fn get(&self, key: &str) -> TierRead<V> {
        let now = Instant::now();
        let live = match self.entries.get_mut(key) {
            Some(mut slot) if !slot.is_expired(now) => {
                slot.touch(now);
                Some(slot.entry.clone())
            }
            Some(_) => None,
            None => return TierRead::Miss,
        };

        match live {
            Some(entry) => TierRead::from(entry),
            None => {
                // Shard guard from get_mut is released by now.
                self.entries.remove_if(key, |_, slot| slot.is_expired(now));
                TierRead::Miss
            }
        }
    }

    fn set(&self, key: &str, entry: CachedEntry<V>, policy: &ExpiryPolicy) {
        self.entries
            .insert(key.to_string(), Slot::new(entry, *policy, Instant::now()));
    }
}
