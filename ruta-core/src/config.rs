//! Static cache configuration: namespace expiration policies, the
//! invalidation-event mapping and retry settings for derived indexes.
//!
//! Settings load from TOML (path in `RUTA_CACHE_CONFIG`) or fall back to
//! [`CacheSettings::default`]; individual values can then be overridden from
//! `RUTA_*` environment variables.

use crate::{ConfigError, EntityType, Namespace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "RUTA_CACHE_CONFIG";

pub const DEFAULT_CONVERSATION_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_HISTORY_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_ADVANCED_TTL_SECS: u64 = 12 * 60 * 60;
/// Longest TTL or check period a namespace may configure (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_DERIVED_MAX_RETRIES: u32 = 3;
pub const DEFAULT_DERIVED_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_DERIVED_MAX_DELAY_MS: u64 = 5000;

// ============================================================================
// EXPIRATION POLICY
// ============================================================================

/// How entries in a namespace expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ExpirationPolicy {
    /// Never expires; only explicit invalidation or flush removes entries.
    Unbounded,
    /// Entries expire `ttl_secs` after their last write (checked on read).
    FixedTtl { ttl_secs: u64 },
    /// Like `FixedTtl`, plus a sweep every `check_period_secs`.
    CheckedPeriodically { ttl_secs: u64, check_period_secs: u64 },
}

impl ExpirationPolicy {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Unbounded => None,
            Self::FixedTtl { ttl_secs } | Self::CheckedPeriodically { ttl_secs, .. } => {
                Some(Duration::from_secs(*ttl_secs))
            }
        }
    }

    pub fn check_period(&self) -> Option<Duration> {
        match self {
            Self::CheckedPeriodically {
                check_period_secs, ..
            } => Some(Duration::from_secs(*check_period_secs)),
            _ => None,
        }
    }
}

// ============================================================================
// INVALIDATION + RETRY
// ============================================================================

/// A Store entry removed when an invalidation event fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidationTarget {
    pub namespace: Namespace,
    pub key: String,
}

impl InvalidationTarget {
    pub fn primary(entity_type: EntityType) -> Self {
        Self {
            namespace: Namespace::Primary,
            key: entity_type.cache_key().to_string(),
        }
    }
}

/// Bounded exponential backoff: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_DERIVED_MAX_RETRIES,
            base_delay_ms: DEFAULT_DERIVED_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_DERIVED_MAX_DELAY_MS,
        }
    }
}

impl RetrySettings {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

// ============================================================================
// CACHE SETTINGS
// ============================================================================

/// Master configuration for the cache layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub namespaces: BTreeMap<Namespace, ExpirationPolicy>,
    pub invalidation_events: BTreeMap<String, Vec<InvalidationTarget>>,
    /// Months of delivery history requested from the delivery source.
    #[serde(default = "default_months_back")]
    pub deliveries_months_back: u32,
    #[serde(default)]
    pub derived_retry: RetrySettings,
}

fn default_months_back() -> u32 {
    1
}

impl Default for CacheSettings {
    fn default() -> Self {
        let namespaces = BTreeMap::from([
            (Namespace::Primary, ExpirationPolicy::Unbounded),
            (
                Namespace::Conversation,
                ExpirationPolicy::CheckedPeriodically {
                    ttl_secs: DEFAULT_CONVERSATION_TTL_SECS,
                    check_period_secs: 120,
                },
            ),
            (
                Namespace::History,
                ExpirationPolicy::CheckedPeriodically {
                    ttl_secs: DEFAULT_HISTORY_TTL_SECS,
                    check_period_secs: 3600,
                },
            ),
            (
                Namespace::Advanced,
                ExpirationPolicy::CheckedPeriodically {
                    ttl_secs: DEFAULT_ADVANCED_TTL_SECS,
                    check_period_secs: 600,
                },
            ),
        ]);

        let invalidation_events = BTreeMap::from([
            (
                "clients.changed".to_string(),
                vec![InvalidationTarget::primary(EntityType::Client)],
            ),
            (
                "products.changed".to_string(),
                vec![InvalidationTarget::primary(EntityType::Product)],
            ),
            (
                "deliveries.changed".to_string(),
                vec![InvalidationTarget::primary(EntityType::Delivery)],
            ),
            (
                "catalog.reset".to_string(),
                EntityType::ALL
                    .into_iter()
                    .map(InvalidationTarget::primary)
                    .collect(),
            ),
        ]);

        Self {
            namespaces,
            invalidation_events,
            deliveries_months_back: default_months_back(),
            derived_retry: RetrySettings::default(),
        }
    }
}

impl CacheSettings {
    /// Load settings from the file named by `RUTA_CACHE_CONFIG`, or the
    /// defaults when the variable is unset. Environment overrides apply last.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(Path::new(&path))?,
            _ => Self::default(),
        };
        let settings = settings.with_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Apply `RUTA_*` environment overrides.
    ///
    /// # Environment Variables
    /// - `RUTA_CONVERSATION_TTL_SECS`: conversation namespace TTL
    /// - `RUTA_HISTORY_TTL_SECS`: history namespace TTL
    /// - `RUTA_ADVANCED_TTL_SECS`: advanced namespace TTL
    /// - `RUTA_DERIVED_MAX_RETRIES`: derived-index dependency retries
    pub fn with_env_overrides(mut self) -> Self {
        let overrides = [
            ("RUTA_CONVERSATION_TTL_SECS", Namespace::Conversation),
            ("RUTA_HISTORY_TTL_SECS", Namespace::History),
            ("RUTA_ADVANCED_TTL_SECS", Namespace::Advanced),
        ];
        for (var, namespace) in overrides {
            if let Some(ttl) = env_u64(var) {
                self.set_ttl(namespace, ttl);
            }
        }
        if let Some(retries) = env_u64("RUTA_DERIVED_MAX_RETRIES") {
            self.derived_retry.max_retries = u32::try_from(retries).unwrap_or(u32::MAX);
        }
        self
    }

    /// Replace the TTL of a namespace, keeping its sweep period if it has one.
    pub fn set_ttl(&mut self, namespace: Namespace, ttl_secs: u64) {
        let policy = match self.namespaces.get(&namespace).and_then(|p| p.check_period()) {
            Some(period) => ExpirationPolicy::CheckedPeriodically {
                ttl_secs,
                check_period_secs: period.as_secs(),
            },
            None => ExpirationPolicy::FixedTtl { ttl_secs },
        };
        self.namespaces.insert(namespace, policy);
    }

    pub fn policy(&self, namespace: Namespace) -> Option<ExpirationPolicy> {
        self.namespaces.get(&namespace).copied()
    }

    /// Structural validation run before the cache is populated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for namespace in Namespace::ALL {
            let policy = self
                .namespaces
                .get(&namespace)
                .ok_or(ConfigError::MissingNamespace { namespace })?;

            match policy {
                ExpirationPolicy::Unbounded => {}
                ExpirationPolicy::FixedTtl { ttl_secs } => {
                    check_secs(&format!("namespaces.{namespace}.ttl_secs"), *ttl_secs)?;
                }
                ExpirationPolicy::CheckedPeriodically {
                    ttl_secs,
                    check_period_secs,
                } => {
                    check_secs(&format!("namespaces.{namespace}.ttl_secs"), *ttl_secs)?;
                    check_secs(
                        &format!("namespaces.{namespace}.check_period_secs"),
                        *check_period_secs,
                    )?;
                }
            }
        }

        if self.namespaces.get(&Namespace::Primary) != Some(&ExpirationPolicy::Unbounded) {
            return Err(ConfigError::InvalidValue {
                field: "namespaces.primary".to_string(),
                reason: "primary data must not expire on a timer".to_string(),
            });
        }

        if self.invalidation_events.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "invalidation_events".to_string(),
                reason: "at least one invalidation event is required".to_string(),
            });
        }

        for (event, targets) in &self.invalidation_events {
            if event.trim().is_empty() || targets.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("invalidation_events.{event}"),
                    reason: "event name and targets must not be empty".to_string(),
                });
            }
            for target in targets {
                let known = target.namespace != Namespace::Primary
                    || EntityType::from_cache_key(&target.key).is_some();
                if !known || target.key.trim().is_empty() {
                    return Err(ConfigError::UnknownInvalidationTarget {
                        event: event.clone(),
                        namespace: target.namespace,
                        key: target.key.clone(),
                    });
                }
            }
        }

        let retry = &self.derived_retry;
        if retry.base_delay_ms == 0 || retry.max_delay_ms < retry.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "derived_retry".to_string(),
                reason: "base_delay_ms must be > 0 and <= max_delay_ms".to_string(),
            });
        }

        Ok(())
    }

    /// Shortest sweep period across namespaces, if any namespace is swept.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.namespaces
            .values()
            .filter_map(ExpirationPolicy::check_period)
            .min()
    }
}

fn env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

fn check_secs(field: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_TTL_SECS {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be between 1 and {MAX_TTL_SECS}"),
        });
    }
    Ok(())
}
