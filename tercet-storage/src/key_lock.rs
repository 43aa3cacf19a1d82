//! Per-key lock registry.
//!
//! Hands out one mutual-exclusion handle per key so that concurrent lookups
//! of the same key walk the tier chain one at a time, while lookups of
//! distinct keys proceed in parallel.
//!
//! # Growth
//!
//! The per-key table never removes a handle. Removing one would open a race
//! where a handle is dropped from the table while another task is about to
//! wait on it, letting two tasks hold "the" lock for a key at once. The table
//! therefore grows with the number of distinct keys observed. When keys can
//! be attacker-controlled, use [`KeyLockRegistry::striped`] instead, which
//! bounds memory at the cost of unrelated keys occasionally sharing a stripe.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tercet_core::LockStrategy;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Handle = Arc<Mutex<()>>;

static GLOBAL: Lazy<Arc<KeyLockRegistry>> = Lazy::new(|| Arc::new(KeyLockRegistry::per_key()));

enum LockTable {
    PerKey(DashMap<String, Handle>),
    Striped(Box<[Handle]>),
}

/// Registry mapping keys to reusable lock handles.
pub struct KeyLockRegistry {
    table: LockTable,
}

impl KeyLockRegistry {
    /// A registry with one handle per distinct key.
    pub fn per_key() -> Self {
        Self {
            table: LockTable::PerKey(DashMap::new()),
        }
    }

    /// A registry with a fixed number of handles shared by hashing keys.
    ///
    /// A stripe count of zero is treated as one.
    pub fn striped(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1))
            .map(|_| Arc::new(Mutex::new(())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            table: LockTable::Striped(stripes),
        }
    }

    /// Build a registry for the given strategy.
    pub fn from_strategy(strategy: LockStrategy) -> Self {
        match strategy {
            LockStrategy::PerKey => Self::per_key(),
            LockStrategy::Striped { stripes } => Self::striped(stripes),
        }
    }

    /// The process-wide per-key registry.
    ///
    /// Accessors built without an explicit registry share this one, so two
    /// accessors in the same process still deduplicate lookups per key.
    pub fn global() -> Arc<KeyLockRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Get or create the handle for `key`.
    fn handle(&self, key: &str) -> Handle {
        match &self.table {
            LockTable::PerKey(locks) => {
                if let Some(existing) = locks.get(key) {
                    return Arc::clone(existing.value());
                }
                // entry() holds the shard write lock, so two racing creators
                // for the same key end up with the same handle.
                let created = locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())));
                Arc::clone(created.value())
            }
            LockTable::Striped(stripes) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                let index = (hasher.finish() % stripes.len() as u64) as usize;
                Arc::clone(&stripes[index])
            }
        }
    }

    /// Wait until exclusive ownership of `key` is obtained.
    ///
    /// Ownership is released when the returned guard is dropped.
    pub async fn acquire(&self, key: &str) -> KeyLockGuard {
        let guard = self.handle(key).lock_owned().await;
        tracing::trace!(key, "key lock acquired");
        KeyLockGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Take ownership of `key` only if nobody holds it right now.
    pub fn try_acquire(&self, key: &str) -> Option<KeyLockGuard> {
        self.handle(key)
            .try_lock_owned()
            .ok()
            .map(|guard| KeyLockGuard {
                key: key.to_string(),
                _guard: guard,
            })
    }

    /// Number of handles currently retained.
    pub fn handle_count(&self) -> usize {
        match &self.table {
            LockTable::PerKey(locks) => locks.len(),
            LockTable::Striped(stripes) => stripes.len(),
        }
    }

    pub fn strategy(&self) -> LockStrategy {
        match &self.table {
            LockTable::PerKey(_) => LockStrategy::PerKey,
            LockTable::Striped(stripes) => LockStrategy::Striped {
                stripes: stripes.len(),
            },
        }
    }
}

impl Default for KeyLockRegistry {
    fn default() -> Self {
        Self::per_key()
    }
}

impl fmt::Debug for KeyLockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLockRegistry")
            .field("strategy", &self.strategy())
            .field("handles", &self.handle_count())
            .finish()
    }
}

/// Exclusive ownership of one key. Dropping the guard releases it.
pub struct KeyLockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release ownership explicitly. Equivalent to dropping the guard.
    pub fn release(self) {
        tracing::trace!(key = %self.key, "key lock released");
    }
}

impl fmt::Debug for KeyLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLockGuard").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_handle_reused_for_same_key() {
        let registry = KeyLockRegistry::per_key();
        let a = registry.handle("key");
        let b = registry.handle("key");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.handle_count(), 1);
    }

    #[tokio::test]
    async fn test_handles_never_removed() {
        let registry = KeyLockRegistry::per_key();
        for i in 0..10 {
            let guard = registry.acquire(&format!("key{i}")).await;
            guard.release();
        }
        assert_eq!(registry.handle_count(), 10);

        // Re-acquiring observed keys does not grow the table.
        let _guard = registry.acquire("key3").await;
        assert_eq!(registry.handle_count(), 10);
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let registry = KeyLockRegistry::per_key();
        let guard = registry.acquire("key").await;
        assert_eq!(guard.key(), "key");
        assert!(registry.try_acquire("key").is_none());

        drop(guard);
        assert!(registry.try_acquire("key").is_some());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let registry = KeyLockRegistry::per_key();
        let _a = registry.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_secs(1), registry.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_handle() {
        let registry = Arc::new(KeyLockRegistry::per_key());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = Arc::clone(&registry);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tasks.push(tokio::spawn(async move {
                let _guard = registry.acquire("shared-key").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.handle_count(), 1);
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_striped_registry_is_bounded() {
        let registry = KeyLockRegistry::striped(4);
        for i in 0..100 {
            registry.acquire(&format!("key{i}")).await.release();
        }
        assert_eq!(registry.handle_count(), 4);
        assert_eq!(registry.strategy(), LockStrategy::Striped { stripes: 4 });
    }

    #[tokio::test]
    async fn test_single_stripe_serializes_everything() {
        let registry = KeyLockRegistry::striped(0);
        assert_eq!(registry.handle_count(), 1);
        let _a = registry.acquire("a").await;
        assert!(registry.try_acquire("b").is_none());
    }

    #[test]
    fn test_from_strategy() {
        assert_eq!(
            KeyLockRegistry::from_strategy(LockStrategy::PerKey).strategy(),
            LockStrategy::PerKey
        );
        assert_eq!(
            KeyLockRegistry::from_strategy(LockStrategy::Striped { stripes: 8 }).handle_count(),
            8
        );
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = KeyLockRegistry::global();
        let b = KeyLockRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.strategy(), LockStrategy::PerKey);
    }
}
