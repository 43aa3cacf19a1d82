//! Tier vocabulary shared across every cache boundary.
//!
//! Absence of a key in the backing store is represented by the
//! [`CachedEntry::Absent`] variant, never by a magic value that could collide
//! with real data. Cache tiers store `CachedEntry<V>`; reads from them yield a
//! [`TierRead<V>`] that separates a real value, confirmed absence and a plain
//! miss.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::{StorageError, TercetResult};

// ============================================================================
// TIER
// ============================================================================

/// One of the three lookup stages, ordered by increasing latency and authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// In-process expiring map.
    Local,
    /// Out-of-process cache shared by every node.
    Shared,
    /// Authoritative store of record.
    Backing,
}

impl Tier {
    /// All tiers in lookup order.
    pub const ALL: [Tier; 3] = [Tier::Local, Tier::Shared, Tier::Backing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Shared => "shared",
            Tier::Backing => "backing",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CACHE VALUE
// ============================================================================

/// Marker trait for payloads that can travel through the tiers.
///
/// Blanket-implemented for every type that is cloneable, serializable and
/// safe to share between tasks.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

// ============================================================================
// CACHED ENTRY
// ============================================================================

/// The form in which a resolution is stored in the shared and local tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedEntry<V> {
    /// A real value from the backing store.
    Present(V),
    /// The backing store confirmed the key does not exist.
    Absent,
}

impl<V> CachedEntry<V> {
    /// Build an entry from a backing store lookup result.
    pub fn from_lookup(value: Option<V>) -> Self {
        match value {
            Some(v) => CachedEntry::Present(v),
            None => CachedEntry::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CachedEntry::Absent)
    }

    /// Translate back into the caller-facing form. `Absent` becomes `None`.
    pub fn into_value(self) -> Option<V> {
        match self {
            CachedEntry::Present(v) => Some(v),
            CachedEntry::Absent => None,
        }
    }

    pub fn as_value(&self) -> Option<&V> {
        match self {
            CachedEntry::Present(v) => Some(v),
            CachedEntry::Absent => None,
        }
    }
}

impl<V: Serialize> CachedEntry<V> {
    /// Encode for transport to a byte-oriented tier.
    pub fn to_bytes(&self, tier: crate::Tier) -> TercetResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            StorageError::Serialization {
                tier,
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl<V: DeserializeOwned> CachedEntry<V> {
    /// Decode bytes previously produced by [`CachedEntry::to_bytes`].
    pub fn from_bytes(bytes: &[u8], tier: crate::Tier) -> TercetResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            StorageError::Serialization {
                tier,
                reason: e.to_string(),
            }
            .into()
        })
    }
}

// ============================================================================
// TIER READ
// ============================================================================

/// Outcome of reading one cache tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierRead<V> {
    /// The tier holds a real value.
    Found(V),
    /// The tier holds a confirmed-absent marker for the key.
    ConfirmedAbsent,
    /// The tier knows nothing about the key.
    Miss,
}

impl<V> TierRead<V> {
    pub fn is_miss(&self) -> bool {
        matches!(self, TierRead::Miss)
    }

    /// The stored form, or `None` on a miss.
    pub fn into_entry(self) -> Option<CachedEntry<V>> {
        match self {
            TierRead::Found(v) => Some(CachedEntry::Present(v)),
            TierRead::ConfirmedAbsent => Some(CachedEntry::Absent),
            TierRead::Miss => None,
        }
    }
}

impl<V> From<Option<CachedEntry<V>>> for TierRead<V> {
    fn from(entry: Option<CachedEntry<V>>) -> Self {
        match entry {
            Some(CachedEntry::Present(v)) => TierRead::Found(v),
            Some(CachedEntry::Absent) => TierRead::ConfirmedAbsent,
            None => TierRead::Miss,
        }
    }
}

impl<V> From<CachedEntry<V>> for TierRead<V> {
    fn from(entry: CachedEntry<V>) -> Self {
        TierRead::from(Some(entry))
    }
}
