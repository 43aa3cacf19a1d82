//! TERCET Test Utilities
//!
//! Centralized test infrastructure for the TERCET workspace:
//! - Recording collaborators that count and log every tier call
//! - Failure injection for each tier
//! - A harness wiring recorders into a `TieredCache`
//! - Proptest generators for keys, values and tier placements

pub mod generators;
pub mod harness;
pub mod recording;

pub use generators::{arb_key, arb_placement, arb_value, Placement};
pub use harness::{Harness, RecordingCache};
pub use recording::{
    CallCounts, RecordingBackingStore, RecordingLocalCache, RecordingSharedCache,
};

// Re-export core types for convenience
pub use tercet_core::{
    CacheConfig, CachedEntry, ConfigError, ExpiryPolicy, LockStrategy, StorageError, TercetError,
    TercetResult, Tier, TierRead, ValidationError,
};
pub use tercet_storage::{
    InMemoryBackingStore, InMemoryLocalCache, InMemorySharedCache, KeyLockRegistry, TieredCache,
};

/// Key used by single-key fixtures.
pub const TEST_KEY: &str = "testKey";
/// Value used by single-key fixtures.
pub const TEST_VALUE: &str = "testValue";
