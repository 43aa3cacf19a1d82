//! In-memory collaborators.
//!
//! Reference implementations of the three tiers, usable in tests, demos and
//! single-node deployments. The backing store and shared cache can simulate
//! round-trip latency so contention behaves the way it does against real
//! remote services.

mod backing;
mod local;
mod shared;

pub use backing::InMemoryBackingStore;
pub use local::InMemoryLocalCache;
pub use shared::InMemorySharedCache;

use std::time::Duration;

/// Sleep for a simulated round trip, if any.
pub(crate) async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
