//! TERCET Core - Shared Types
//!
//! Plain data types shared by every TERCET crate: the error taxonomy, the
//! tier/entry vocabulary used at every cache boundary, and the accessor
//! configuration. This crate performs no I/O.

pub mod config;
pub mod entry;
pub mod error;

pub use config::{CacheConfig, ExpiryPolicy, LockStrategy};
pub use entry::{CacheValue, CachedEntry, Tier, TierRead};
pub use error::{ConfigError, StorageError, TercetError, TercetResult, ValidationError};

/// Returns true if `key` can never resolve to a value.
///
/// Empty keys short-circuit every read without touching a tier.
pub fn is_unresolvable_key(key: &str) -> bool {
    key.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_unresolvable() {
        assert!(is_unresolvable_key(""));
        assert!(!is_unresolvable_key("key0"));
        assert!(!is_unresolvable_key(" "));
    }
}
