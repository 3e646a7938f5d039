//! # Engine Error Types
//!
//! One error type for every public engine operation.
//!
//! ## Error Classes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Settlement Error Classes                           │
//! │                                                                         │
//! │  ┌─────────────────────────┐  ┌─────────────────┐  ┌─────────────────┐ │
//! │  │  Domain (expected)      │  │ Storage         │  │ Config          │ │
//! │  │                         │  │ (internal)      │  │                 │ │
//! │  │  ProductNotFound        │  │                 │  │ InvalidConfig   │ │
//! │  │  InsufficientStock      │  │ DbError::*      │  │ ConfigLoad      │ │
//! │  │  OrderNotFound          │  │                 │  │ ConfigSave      │ │
//! │  │  InvalidOrderState      │  │                 │  │                 │ │
//! │  │  Validation             │  │                 │  │                 │ │
//! │  └─────────────────────────┘  └─────────────────┘  └─────────────────┘ │
//! │                                                                         │
//! │  Domain errors map to client-visible rejections. Storage errors are    │
//! │  the generic internal failure. Nothing here is retried by the engine.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use settle_core::{CoreError, ValidationError};
use settle_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type SettleResult<T> = Result<T, SettleError>;

/// Failure of a settlement operation.
#[derive(Debug, Error)]
pub enum SettleError {
    // =========================================================================
    // Expected failures
    // =========================================================================
    /// A rule of the settlement domain rejected the request.
    #[error(transparent)]
    Domain(#[from] CoreError),

    // =========================================================================
    // Infrastructure
    // =========================================================================
    /// The store failed underneath the operation. The transaction, if one
    /// was open, has been rolled back.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl From<ValidationError> for SettleError {
    fn from(err: ValidationError) -> Self {
        SettleError::Domain(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for SettleError {
    fn from(err: std::io::Error) -> Self {
        SettleError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SettleError {
    fn from(err: toml::de::Error) -> Self {
        SettleError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SettleError {
    fn from(err: toml::ser::Error) -> Self {
        SettleError::ConfigSaveFailed(err.to_string())
    }
}

impl SettleError {
    /// True for the generic internal class (storage failures).
    pub fn is_internal(&self) -> bool {
        matches!(self, SettleError::Storage(_))
    }

    /// True for configuration problems.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SettleError::InvalidConfig(_)
                | SettleError::ConfigLoadFailed(_)
                | SettleError::ConfigSaveFailed(_)
        )
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            SettleError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let domain: SettleError = CoreError::OrderNotFound("o-1".into()).into();
        assert!(!domain.is_internal());
        assert!(domain.as_domain().is_some());

        let storage: SettleError = DbError::Busy("database is locked".into()).into();
        assert!(storage.is_internal());
        assert!(storage.as_domain().is_none());

        let config = SettleError::InvalidConfig("max_connections".into());
        assert!(config.is_config_error());
        assert!(!config.is_internal());
    }

    #[test]
    fn test_validation_lifts_into_domain() {
        let err: SettleError = ValidationError::Required {
            field: "reason".into(),
        }
        .into();

        assert!(matches!(
            err,
            SettleError::Domain(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[test]
    fn test_domain_message_is_transparent() {
        let err: SettleError = CoreError::ProductNotFound("p-9".into()).into();
        assert_eq!(err.to_string(), "Product not found: p-9");
    }
}
