//! Collaborator traits consumed by the tiered accessor.
//!
//! The accessor never interprets tier failures: an `Err` from any of these
//! is propagated to the caller as-is. Retry policy, if any, belongs inside
//! the implementation.

use async_trait::async_trait;
use tercet_core::{CacheValue, CachedEntry, ExpiryPolicy, TercetResult, TierRead};

/// Authoritative source of truth. The slowest tier.
///
/// Must be safe for concurrent access to distinct keys. Concurrent access to
/// the same key is serialized by the accessor's per-key lock.
#[async_trait]
pub trait BackingStore<V: CacheValue>: Send + Sync {
    /// Look up a key. `Ok(None)` means the store does not contain it.
    async fn get(&self, key: &str) -> TercetResult<Option<V>>;

    /// Write a value, overwriting any previous one.
    async fn put(&self, key: &str, value: V) -> TercetResult<()>;
}

/// Cache shared by every process or node, e.g. a remote key/value service.
///
/// Stores [`CachedEntry`] values so confirmed absence is visible to other
/// processes as well.
#[async_trait]
pub trait SharedCache<V: CacheValue>: Send + Sync {
    /// Read a key.
    async fn get(&self, key: &str) -> TercetResult<TierRead<V>>;

    /// Store a value or an absence marker.
    async fn put(&self, key: &str, entry: CachedEntry<V>) -> TercetResult<()>;
}

/// In-process cache. Shared by every task in the process, so
/// implementations must support concurrent `get`/`set`.
///
/// Local operations cannot fail.
pub trait LocalCache<V: CacheValue>: Send + Sync {
    /// Read a key. Expired entries read as [`TierRead::Miss`].
    fn get(&self, key: &str) -> TierRead<V>;

    /// Store a value or an absence marker under the given expiry policy.
    fn set(&self, key: &str, entry: CachedEntry<V>, policy: &ExpiryPolicy);
}
