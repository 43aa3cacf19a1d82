//! Error types for TERCET operations

use crate::Tier;
use thiserror::Error;

/// Failures reported by a cache tier or the backing store.
///
/// A tier that cleanly reports a miss is not an error; these variants are
/// only used when the tier itself could not answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{tier} tier failed: {reason}")]
    TierFailed { tier: Tier, reason: String },

    #[error("Serialization failed in {tier} tier: {reason}")]
    Serialization { tier: Tier, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cache key must not be empty")]
    EmptyKey,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required collaborator for the {tier} tier")]
    MissingCollaborator { tier: Tier },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all TERCET errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TercetError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TercetError {
    /// Shorthand for a [`StorageError::TierFailed`] wrapped in a `TercetError`.
    pub fn tier_failed(tier: Tier, reason: impl Into<String>) -> Self {
        StorageError::TierFailed {
            tier,
            reason: reason.into(),
        }
        .into()
    }

    /// The tier that produced this error, if any.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            TercetError::Storage(StorageError::TierFailed { tier, .. })
            | TercetError::Storage(StorageError::Serialization { tier, .. }) => Some(*tier),
            TercetError::Config(ConfigError::MissingCollaborator { tier }) => Some(*tier),
            _ => None,
        }
    }
}

/// Result type alias for TERCET operations.
pub type TercetResult<T> = Result<T, TercetError>;

// =============================================================================
// TESTS
// =============================================================================
