//! TERCET Storage - Tiered Read-Through Cache
//!
//! Resolves keys through three tiers of increasing latency and authority:
//! an in-process [`LocalCache`], an out-of-process [`SharedCache`] and the
//! authoritative [`BackingStore`].
//!
//! Concurrent lookups of the same key are serialized through a
//! [`KeyLockRegistry`], so within one process only the first caller walks
//! the slow tiers; everyone queued behind it is answered from the local tier.
//! A backing store "not found" is cached as [`CachedEntry::Absent`] in both
//! cache tiers and reported to callers as `None`.
//!
//! # Example
//!
//! ```ignore
//! let cache: TieredCache<String, _, _, _> = TieredCache::builder()
//!     .backing_store(Arc::new(InMemoryBackingStore::new()))
//!     .shared_cache(Arc::new(InMemorySharedCache::new()))
//!     .local_cache(Arc::new(InMemoryLocalCache::new()))
//!     .build()?;
//!
//! cache.store_value("key0", "value0".to_string()).await?;
//! assert_eq!(cache.get_value("key0").await?, Some("value0".to_string()));
//! assert_eq!(cache.get_value("missing").await?, None);
//! ```

pub mod key_lock;
pub mod memory;
pub mod stats;
pub mod tiered;
pub mod traits;

pub use key_lock::{KeyLockGuard, KeyLockRegistry};
pub use memory::{InMemoryBackingStore, InMemoryLocalCache, InMemorySharedCache};
pub use stats::{StatsSnapshot, TieredStats};
pub use tiered::{TieredCache, TieredCacheBuilder};
pub use traits::{BackingStore, LocalCache, SharedCache};

// Re-export the core vocabulary so most callers need a single dependency.
pub use tercet_core::{
    CacheConfig, CacheValue, CachedEntry, ConfigError, ExpiryPolicy, LockStrategy, StorageError,
    TercetError, TercetResult, Tier, TierRead, ValidationError,
};
