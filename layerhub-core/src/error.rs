//! Error types for layerhub wiring and cache management.
//!
//! Runtime failures of individual tiers never use these types; they travel
//! through the result channel as [`crate::AccessResult::Error`]. The errors
//! here are returned when something is assembled incorrectly.

use crate::AccessId;
use thiserror::Error;

/// Configuration errors, rejected at construction time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Hub {hub} has no accesses to query")]
    NoAccesses { hub: String },

    #[error("Duplicate access id {id} in hub {hub}")]
    DuplicateAccessId { hub: String, id: AccessId },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Cache manager errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache capacity must be greater than 0")]
    ZeroCapacity,

    #[error("Cache {name} is registered with a different key or value type")]
    TypeMismatch { name: String },
}

/// Master error type for layerhub.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayerHubError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type alias for layerhub construction paths.
pub type HubResult<T> = Result<T, LayerHubError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_duplicate() {
        let err = ConfigError::DuplicateAccessId {
            hub: "profile".to_string(),
            id: AccessId::new(20),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Duplicate access id"));
        assert!(msg.contains("access#20"));
        assert!(msg.contains("profile"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "default_capacity".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("default_capacity"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_cache_error_display_type_mismatch() {
        let err = CacheError::TypeMismatch {
            name: "sessions".to_string(),
        };
        assert!(format!("{}", err).contains("sessions"));
    }

    #[test]
    fn test_layerhub_error_from_variants() {
        let config = LayerHubError::from(ConfigError::NoAccesses {
            hub: "empty".to_string(),
        });
        assert!(matches!(config, LayerHubError::Config(_)));

        let cache = LayerHubError::from(CacheError::ZeroCapacity);
        assert!(matches!(cache, LayerHubError::Cache(_)));
    }
}
