//! Configuration types
//!
//! Configuration is loaded from environment variables or a TOML document,
//! with defaults that reproduce the plain behaviour: local entries never
//! expire and every distinct key gets its own lock.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ConfigError, TercetResult};

/// Environment variable selecting the local expiry kind (`never|sliding|absolute`).
pub const ENV_LOCAL_EXPIRY: &str = "TERCET_LOCAL_EXPIRY";
/// Environment variable holding the local TTL in milliseconds.
pub const ENV_LOCAL_TTL_MS: &str = "TERCET_LOCAL_TTL_MS";
/// Environment variable holding the lock stripe count (unset or 0 = per-key).
pub const ENV_LOCK_STRIPES: &str = "TERCET_LOCK_STRIPES";

// ============================================================================
// EXPIRY POLICY
// ============================================================================

/// Expiry policy the accessor hands to the local cache on every `set`.
///
/// The accessor only supplies the policy; honouring it is the local cache's
/// job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Entries live until overwritten or the cache is dropped.
    #[default]
    Never,
    /// Entries expire after `ttl` without being read; each read renews them.
    Sliding(Duration),
    /// Entries expire `ttl` after they were written, regardless of reads.
    Absolute(Duration),
}

impl ExpiryPolicy {
    /// Build a policy from its textual kind and a TTL in milliseconds.
    pub fn parse(kind: &str, ttl_ms: Option<u64>) -> TercetResult<Self> {
        let ttl = ttl_ms.map(Duration::from_millis);
        let policy = match kind.trim().to_lowercase().as_str() {
            "never" | "none" => ExpiryPolicy::Never,
            "sliding" => ExpiryPolicy::Sliding(ttl.ok_or_else(|| missing_ttl(kind))?),
            "absolute" => ExpiryPolicy::Absolute(ttl.ok_or_else(|| missing_ttl(kind))?),
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: "local_expiry".to_string(),
                    value: kind.to_string(),
                    reason: "expected one of never, sliding, absolute".to_string(),
                }
                .into())
            }
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExpiryPolicy::Never => "never",
            ExpiryPolicy::Sliding(_) => "sliding",
            ExpiryPolicy::Absolute(_) => "absolute",
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        match self {
            ExpiryPolicy::Never => None,
            ExpiryPolicy::Sliding(ttl) | ExpiryPolicy::Absolute(ttl) => Some(*ttl),
        }
    }

    /// Whether reads renew the entry's lifetime.
    pub fn is_sliding(&self) -> bool {
        matches!(self, ExpiryPolicy::Sliding(_))
    }

    pub fn validate(&self) -> TercetResult<()> {
        match self.ttl() {
            Some(ttl) if ttl.is_zero() => {
                Err(invalid_ttl(self.kind(), ttl, "ttl must be positive"))
            }
            // TTLs are configured and rendered in milliseconds.
            Some(ttl) if ttl.subsec_nanos() % 1_000_000 != 0 => Err(invalid_ttl(
                self.kind(),
                ttl,
                "ttl must be a whole number of milliseconds",
            )),
            _ => Ok(()),
        }
    }
}

fn invalid_ttl(kind: &str, ttl: Duration, reason: &str) -> crate::TercetError {
    ConfigError::InvalidValue {
        field: "local_expiry".to_string(),
        value: format!("{kind}:{ttl:?}"),
        reason: reason.to_string(),
    }
    .into()
}

fn missing_ttl(kind: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: "local_ttl_ms".to_string(),
        value: kind.to_string(),
        reason: "a ttl is required for this expiry kind".to_string(),
    }
}

// ============================================================================
// LOCK STRATEGY
// ============================================================================

/// How the accessor maps keys to mutual-exclusion handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockStrategy {
    /// One handle per distinct key, retained for the life of the registry.
    #[default]
    PerKey,
    /// Keys hashed onto a fixed set of handles. Bounded memory, but distinct
    /// keys that share a stripe serialize with each other.
    Striped { stripes: usize },
}

impl LockStrategy {
    pub fn from_stripes(stripes: usize) -> Self {
        if stripes == 0 {
            LockStrategy::PerKey
        } else {
            LockStrategy::Striped { stripes }
        }
    }
}

// ============================================================================
// CACHE CONFIG
// ============================================================================

/// Tiered accessor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheConfig {
    /// Policy supplied to the local cache on every write to it.
    pub local_expiry: ExpiryPolicy,
    /// Per-key lock table layout.
    pub lock_strategy: LockStrategy,
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local expiry policy.
    pub fn with_local_expiry(mut self, policy: ExpiryPolicy) -> Self {
        self.local_expiry = policy;
        self
    }

    /// Set the lock strategy.
    pub fn with_lock_strategy(mut self, strategy: LockStrategy) -> Self {
        self.lock_strategy = strategy;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - expiry TTLs are positive
    /// - striped locking has at least one stripe
    pub fn validate(&self) -> TercetResult<()> {
        self.local_expiry.validate()?;
        if let LockStrategy::Striped { stripes: 0 } = self.lock_strategy {
            return Err(ConfigError::InvalidValue {
                field: "lock_stripes".to_string(),
                value: "0".to_string(),
                reason: "striped locking needs at least one stripe".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Create a CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TERCET_LOCAL_EXPIRY`: `never`, `sliding` or `absolute` (default: never)
    /// - `TERCET_LOCAL_TTL_MS`: TTL in milliseconds, required unless `never`
    /// - `TERCET_LOCK_STRIPES`: stripe count; unset or 0 means per-key locks
    pub fn from_env() -> TercetResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`] but with an injectable variable source.
    pub fn from_vars<F>(lookup: F) -> TercetResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ttl_ms = match lookup(ENV_LOCAL_TTL_MS) {
            Some(raw) => Some(parse_number::<u64>(ENV_LOCAL_TTL_MS, &raw)?),
            None => None,
        };

        let local_expiry = match lookup(ENV_LOCAL_EXPIRY) {
            Some(kind) => ExpiryPolicy::parse(&kind, ttl_ms)?,
            None => ExpiryPolicy::Never,
        };

        let lock_strategy = match lookup(ENV_LOCK_STRIPES) {
            Some(raw) => LockStrategy::from_stripes(parse_number::<usize>(ENV_LOCK_STRIPES, &raw)?),
            None => LockStrategy::PerKey,
        };

        let config = Self {
            local_expiry,
            lock_strategy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document.
    ///
    /// ```toml
    /// [local_expiry]
    /// kind = "sliding"
    /// ttl_ms = 60000
    ///
    /// [locks]
    /// stripes = 64
    /// ```
    ///
    /// Both tables are optional.
    pub fn from_toml_str(source: &str) -> TercetResult<Self> {
        let file: ConfigFile = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;

        let local_expiry = match file.local_expiry {
            Some(section) => ExpiryPolicy::parse(&section.kind, section.ttl_ms)?,
            None => ExpiryPolicy::Never,
        };
        let lock_strategy = file
            .locks
            .map(|section| LockStrategy::from_stripes(section.stripes))
            .unwrap_or_default();

        let config = Self {
            local_expiry,
            lock_strategy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document accepted by [`CacheConfig::from_toml_str`].
    ///
    /// Fails for a configuration that does not validate.
    pub fn to_toml_string(&self) -> TercetResult<String> {
        self.validate()?;
        let file = ConfigFile {
            local_expiry: Some(ExpirySection {
                kind: self.local_expiry.kind().to_string(),
                ttl_ms: self.local_expiry.ttl().map(|ttl| ttl.as_millis() as u64),
            }),
            locks: Some(LockSection {
                stripes: match self.lock_strategy {
                    LockStrategy::PerKey => 0,
                    LockStrategy::Striped { stripes } => stripes,
                },
            }),
        };
        toml::to_string(&file).map_err(|e| {
            ConfigError::Parse {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> TercetResult<T> {
    raw.trim().parse::<T>().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "expected a non-negative integer".to_string(),
        }
        .into()
    })
}

/// On-disk shape of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_expiry: Option<ExpirySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locks: Option<LockSection>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpirySection {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LockSection {
    #[serde(default)]
    stripes: usize,
}
