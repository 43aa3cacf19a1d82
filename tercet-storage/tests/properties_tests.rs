//! Property tests over tier placements.

use proptest::prelude::*;
use tercet_storage::{CachedEntry, Tier};
use tercet_test_utils::generators::{arb_key, arb_placement, arb_value};
use tercet_test_utils::Harness;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever tier holds the value, a lookup returns it and later lookups
    /// are answered locally.
    #[test]
    fn prop_lookup_matches_placement(
        key in arb_key(),
        value in arb_value(),
        placement in arb_placement(),
    ) {
        let h = Harness::<String>::new();
        placement.apply(&h, &key, value.clone());

        let (first, second) = block_on(async {
            let first = h.cache.get_value(&key).await.unwrap();
            let second = h.cache.get_value(&key).await.unwrap();
            (first, second)
        });

        let expected = placement.holds_value().then(|| value.clone());
        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(&second, &expected);

        let stats = h.cache.stats();
        let answered_first = match placement.answering_tier() {
            Tier::Local => stats.local_hits,
            Tier::Shared => stats.shared_hits,
            Tier::Backing => stats.backing_fetches,
        };
        prop_assert!(answered_first >= 1);
        prop_assert_eq!(h.backing.counts().gets as u64, stats.backing_fetches);
        prop_assert!(h.backing.counts().gets <= 1);
    }

    /// A stored value is read back without consulting the backing store.
    #[test]
    fn prop_store_then_get(key in arb_key(), value in arb_value()) {
        let h = Harness::<String>::new();

        let read = block_on(async {
            h.cache.store_value(&key, value.clone()).await.unwrap();
            h.cache.get_value(&key).await.unwrap()
        });

        prop_assert_eq!(read, Some(value));
        prop_assert_eq!(h.backing.counts().gets, 0);
    }

    /// Absence is only ever stored as the marker and read back as `None`,
    /// even when a present value looks like an encoded marker.
    #[test]
    fn prop_absence_never_leaks(key in arb_key(), lookalike in "(\\{\"absent\"\\}|absent|null|\"absent\")") {
        let h = Harness::<String>::new();
        let other = format!("{key}-present");
        h.prime_backing(&other, lookalike.clone());

        let (missing, present) = block_on(async {
            let missing = h.cache.get_value(&key).await.unwrap();
            let present = h.cache.get_value(&other).await.unwrap();
            (missing, present)
        });

        prop_assert_eq!(missing, None);
        prop_assert_eq!(present, Some(lookalike.clone()));
        prop_assert_eq!(h.shared.inner().peek(&key).unwrap(), Some(CachedEntry::Absent));
        prop_assert_eq!(
            h.shared.inner().peek(&other).unwrap(),
            Some(CachedEntry::Present(lookalike))
        );
    }
}

#[test]
fn empty_key_never_reaches_a_tier() {
    let h = Harness::<String>::new();
    for placement in [
        tercet_test_utils::Placement::Nowhere,
        tercet_test_utils::Placement::Everywhere,
    ] {
        placement.apply(&h, "", "value".to_string());
        h.reset_counts();
        let read = block_on(h.cache.get_value(""));
        assert_eq!(read.unwrap(), None);
        assert_eq!(h.total_tier_calls(), 0);
    }
}
