//! Configuration types

use crate::error::{ConfigError, HubResult};
use crate::AccessId;
use serde::{Deserialize, Serialize};

/// Id given to key-bound cache accesses when the caller does not pick one.
pub const DEFAULT_CACHE_ACCESS_ID: AccessId = AccessId::new(0);

/// Defaults used when caches are created through a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Capacity of bounded caches created without an explicit capacity
    pub default_capacity: usize,
    /// Id of key-bound accesses a cache registry hands out
    pub cache_access_id: AccessId,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            cache_access_id: DEFAULT_CACHE_ACCESS_ID,
        }
    }
}

impl CacheSettings {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `LAYERHUB_CACHE_CAPACITY`: capacity of bounded caches (default: 1024)
    /// - `LAYERHUB_CACHE_ACCESS_ID`: id of key-bound accesses (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_capacity: std::env::var("LAYERHUB_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_capacity),
            cache_access_id: std::env::var("LAYERHUB_CACHE_ACCESS_ID")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .map(AccessId::new)
                .unwrap_or(defaults.cache_access_id),
        }
    }

    pub fn validate(&self) -> HubResult<()> {
        if self.default_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_capacity".to_string(),
                value: self.default_capacity.to_string(),
                reason: "default_capacity must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
