//! Per-key serialization under concurrent load.

use std::time::{Duration, Instant};

use tercet_storage::{CacheConfig, CachedEntry, LockStrategy};
use tercet_test_utils::Harness;

const KEY: &str = "key";
const VALUE: &str = "value";
const NUMBER_OF_TASKS: usize = 100;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_callers_reach_backing_store_once() {
    let h = Harness::<String>::with_latency(Duration::from_millis(50), Duration::from_millis(10));
    h.prime_backing(KEY, VALUE.to_string());

    let mut tasks = Vec::with_capacity(NUMBER_OF_TASKS);
    for _ in 0..NUMBER_OF_TASKS {
        let cache = h.cache.clone();
        tasks.push(tokio::spawn(async move { cache.get_value(KEY).await }));
    }
    for task in tasks {
        let value = task.await.unwrap().unwrap();
        assert_eq!(value.as_deref(), Some(VALUE));
    }

    assert_eq!(h.backing.counts().gets, 1);
    assert_eq!(h.backing.max_concurrent_gets(), 1);
    assert_eq!(h.shared.counts().gets, 1);
    assert_eq!(h.shared.counts().puts, 1);
    assert_eq!(
        h.shared.put_log(),
        vec![(KEY.to_string(), CachedEntry::Present(VALUE.to_string()))]
    );
    // Every caller checks the local tier once; only the first one fills it.
    assert_eq!(h.local.counts().gets, NUMBER_OF_TASKS);
    assert_eq!(h.local.counts().puts, 1);

    let stats = h.cache.stats();
    assert_eq!(stats.backing_fetches, 1);
    assert_eq!(stats.local_hits, (NUMBER_OF_TASKS - 1) as u64);
}

#[tokio::test]
async fn absent_key_is_queried_once_and_cached_as_marker() {
    let h = Harness::<String>::new();

    assert_eq!(h.cache.get_value(KEY).await.unwrap(), None);
    assert_eq!(h.cache.get_value(KEY).await.unwrap(), None);

    assert_eq!(h.backing.counts().gets, 1);
    assert_eq!(h.shared.counts().gets, 1);
    assert_eq!(h.shared.put_log(), vec![(KEY.to_string(), CachedEntry::Absent)]);
    assert_eq!(h.local.counts().gets, 2);
    assert_eq!(h.local.counts().puts, 1);
    assert_eq!(h.local.inner().peek(KEY), Some(CachedEntry::Absent));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_callers_for_absent_key_share_one_backing_query() {
    let h = Harness::<String>::with_latency(Duration::from_millis(50), Duration::from_millis(10));

    let mut tasks = Vec::new();
    for _ in 0..NUMBER_OF_TASKS {
        let cache = h.cache.clone();
        tasks.push(tokio::spawn(async move { cache.get_value(KEY).await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), None);
    }

    assert_eq!(h.backing.counts().gets, 1);
    assert_eq!(h.shared.put_log(), vec![(KEY.to_string(), CachedEntry::Absent)]);
    assert_eq!(h.cache.stats().absent_results, NUMBER_OF_TASKS as u64);
}

#[tokio::test]
async fn absence_propagates_to_other_processes_through_shared_tier() {
    let h = Harness::<String>::new();
    let (other_local, other_cache) = h.sibling_process();

    assert_eq!(h.cache.get_value(KEY).await.unwrap(), None);
    assert_eq!(other_cache.get_value(KEY).await.unwrap(), None);

    assert_eq!(h.backing.counts().gets, 1);
    assert_eq!(other_cache.stats().shared_hits, 1);
    assert_eq!(other_local.inner().peek(KEY), Some(CachedEntry::Absent));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn distinct_keys_resolve_in_parallel() {
    let latency = Duration::from_millis(200);
    let h = Harness::<String>::with_latency(latency, Duration::ZERO);
    for i in 0..10 {
        h.prime_backing(&format!("key{i}"), format!("value{i}"));
    }

    let started = Instant::now();
    let mut tasks = Vec::new();
    for i in 0..10 {
        let cache = h.cache.clone();
        tasks.push(tokio::spawn(async move {
            cache.get_value(&format!("key{i}")).await
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let value = task.await.unwrap().unwrap();
        assert_eq!(value, Some(format!("value{i}")));
    }

    // Serialized, ten lookups would take at least two seconds.
    assert!(started.elapsed() < latency * 5);
    assert!(h.backing.max_concurrent_gets() > 1);
    assert_eq!(h.locks.handle_count(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_stripe_serializes_distinct_keys() {
    let h = Harness::<String>::with_config(
        CacheConfig::new().with_lock_strategy(LockStrategy::Striped { stripes: 1 }),
    );

    let mut tasks = Vec::new();
    for i in 0..20 {
        let cache = h.cache.clone();
        tasks.push(tokio::spawn(async move {
            cache.get_value(&format!("key{i}")).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.backing.counts().gets, 20);
    assert_eq!(h.backing.max_concurrent_gets(), 1);
    assert_eq!(h.locks.handle_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn write_waits_for_key_lock() {
    let h = Harness::<String>::new();
    let guard = h.locks.acquire(KEY).await;

    let cache = h.cache.clone();
    let write = tokio::spawn(async move { cache.store_value(KEY, VALUE.to_string()).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.backing.counts().puts, 0, "write must not start while the key is held");

    drop(guard);
    write.await.unwrap().unwrap();
    assert_eq!(h.backing.counts().puts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn read_during_write_sees_new_value() {
    let h = Harness::<String>::with_latency(Duration::from_millis(100), Duration::from_millis(10));
    h.prime_backing(KEY, "old".to_string());

    let cache = h.cache.clone();
    let write = tokio::spawn(async move { cache.store_value(KEY, "new".to_string()).await });

    // Let the writer take the key lock before reading.
    while h.locks.handle_count() == 0 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    let read = h.cache.get_value(KEY).await.unwrap();
    write.await.unwrap().unwrap();

    assert_eq!(read.as_deref(), Some("new"));
    assert_eq!(h.backing.counts().gets, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn lock_released_after_tier_error() {
    let h = Harness::<String>::new();
    h.shared.fail_gets(true);

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let cache = h.cache.clone();
        tasks.push(tokio::spawn(async move { cache.get_value(KEY).await }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_err());
    }

    assert!(h.locks.try_acquire(KEY).is_some());
    h.shared.fail_gets(false);
    h.prime_backing(KEY, VALUE.to_string());
    assert_eq!(
        h.cache.get_value(KEY).await.unwrap().as_deref(),
        Some(VALUE)
    );
}
