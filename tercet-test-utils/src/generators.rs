//! Proptest generators.

use proptest::prelude::*;
use tercet_core::{CacheValue, Tier};

use crate::harness::Harness;

/// Non-empty cache keys.
pub fn arb_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:_-]{1,24}"
}

/// Arbitrary string payloads, including the empty string.
pub fn arb_value() -> impl Strategy<Value = String> {
    ".{0,32}"
}

/// Where a value lives before a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Nowhere,
    BackingOnly,
    SharedOnly,
    LocalOnly,
    Everywhere,
}

impl Placement {
    /// The tier expected to answer the first lookup.
    pub fn answering_tier(&self) -> Tier {
        match self {
            Placement::Nowhere | Placement::BackingOnly => Tier::Backing,
            Placement::SharedOnly => Tier::Shared,
            Placement::LocalOnly | Placement::Everywhere => Tier::Local,
        }
    }

    pub fn holds_value(&self) -> bool {
        !matches!(self, Placement::Nowhere)
    }

    /// Prime `harness` so `key` maps to `value` in the tiers this placement names.
    pub fn apply<V: CacheValue>(&self, harness: &Harness<V>, key: &str, value: V) {
        match self {
            Placement::Nowhere => {}
            Placement::BackingOnly => harness.prime_backing(key, value),
            Placement::SharedOnly => harness.prime_shared(key, value),
            Placement::LocalOnly => harness.prime_local(key, value),
            Placement::Everywhere => harness.prime_all(key, value),
        }
    }
}

pub fn arb_placement() -> impl Strategy<Value = Placement> {
    prop_oneof![
        Just(Placement::Nowhere),
        Just(Placement::BackingOnly),
        Just(Placement::SharedOnly),
        Just(Placement::LocalOnly),
        Just(Placement::Everywhere),
    ]
}
