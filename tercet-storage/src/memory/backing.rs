use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tercet_core::{CacheValue, TercetResult};

use super::simulate_latency;
use crate::traits::BackingStore;

/// Concurrent map standing in for a database.
pub struct InMemoryBackingStore<V> {
    values: DashMap<String, V>,
    latency: Duration,
}

impl<V: CacheValue> InMemoryBackingStore<V> {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            latency: Duration::ZERO,
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

    /// Insert directly, bypassing simulated latency.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.values.insert(key.into(), value);
    }

    /// Read directly, bypassing simulated latency.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.values.get(key).map(|v| v.value().clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&self) {
        self.values.clear();
    }
}

impl<V: CacheValue> Default for InMemoryBackingStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for InMemoryBackingStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBackingStore")
            .field("len", &self.values.len())
            .field("latency", &self.latency)
            .finish()
    }
}

#[async_trait]
impl<V: CacheValue> BackingStore<V> for InMemoryBackingStore<V> {
    async fn get(&self, key: &str) -> TercetResult<Option<V>> {
        simulate_latency(self.latency).await;
        Ok(self.peek(key))
    }

    async fn put(&self, key: &str, value: V) -> TercetResult<()> {
        simulate_latency(self.latency).await;
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_get_put() {
        let store = InMemoryBackingStore::<String>::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.put("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_latency_is_simulated() {
        let store = InMemoryBackingStore::<u32>::new().with_latency(Duration::from_millis(30));
        store.insert("k", 1);

        let started = Instant::now();
        assert_eq!(store.get("k").await.unwrap(), Some(1));
        assert!(started.elapsed() >= Duration::from_millis(30));

        // Direct access skips the delay.
        assert_eq!(store.peek("k"), Some(1));
    }
}
