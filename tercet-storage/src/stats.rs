//! Accessor statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use tercet_core::Tier;

/// Lock-free counters updated by the tiered accessor.
#[derive(Debug, Default)]
pub struct TieredStats {
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    backing_fetches: AtomicU64,
    absent_results: AtomicU64,
    empty_key_reads: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl TieredStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lookup answered by `tier`.
    pub fn record_resolution(&self, tier: Tier, absent: bool) {
        let counter = match tier {
            Tier::Local => &self.local_hits,
            Tier::Shared => &self.shared_hits,
            Tier::Backing => &self.backing_fetches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if absent {
            self.absent_results.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_empty_key(&self) {
        self.empty_key_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            shared_hits: self.shared_hits.load(Ordering::Relaxed),
            backing_fetches: self.backing_fetches.load(Ordering::Relaxed),
            absent_results: self.absent_results.load(Ordering::Relaxed),
            empty_key_reads: self.empty_key_reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about accessor usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Lookups answered by the local tier.
    pub local_hits: u64,
    /// Lookups answered by the shared tier.
    pub shared_hits: u64,
    /// Lookups that reached the backing store.
    pub backing_fetches: u64,
    /// Lookups that returned confirmed absence, from any tier.
    pub absent_results: u64,
    /// Reads short-circuited because the key was empty.
    pub empty_key_reads: u64,
    /// Successful write-throughs.
    pub writes: u64,
    /// Operations that failed with a tier error.
    pub errors: u64,
}

impl StatsSnapshot {
    /// Total lookups that went through the tier chain.
    pub fn lookups(&self) -> u64 {
        self.local_hits + self.shared_hits + self.backing_fetches
    }

    /// Fraction of lookups answered without the backing store (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            (self.local_hits + self.shared_hits) as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = TieredStats::new();
        for _ in 0..6 {
            stats.record_resolution(Tier::Local, false);
        }
        stats.record_resolution(Tier::Shared, false);
        stats.record_resolution(Tier::Shared, true);
        stats.record_resolution(Tier::Backing, false);
        stats.record_resolution(Tier::Backing, true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.lookups(), 10);
        assert_eq!(snapshot.absent_results, 2);
        assert!((snapshot.hit_rate() - 0.8).abs() < 0.001);

        assert!((StatsSnapshot::default().hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_other_counters() {
        let stats = TieredStats::new();
        stats.record_empty_key();
        stats.record_write();
        stats.record_write();
        stats.record_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.empty_key_reads, 1);
        assert_eq!(snapshot.writes, 2);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.lookups(), 0);
    }
}
