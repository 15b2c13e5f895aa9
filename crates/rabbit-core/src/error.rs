//! # Error Types
//!
//! Domain-specific error types for rabbit-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  rabbit-core errors (this file)                                        │
//! │  ├── CoreError        - Snapshot mutation failures                     │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  ├── EncodeError      - Compact token could not be written             │
//! │  └── DecodeError      - Compact token could not be read                │
//! │                                                                         │
//! │  rabbit-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  rabbit-sync errors (separate crate)                                   │
//! │  └── SyncError        - Session, flush and share failures              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while mutating a tab snapshot.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item id is not part of the tab.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Rabbit id is not part of the tab.
    #[error("Rabbit not found: {0}")]
    RabbitNotFound(String),

    /// An entity with this id already exists in the tab.
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a mutation touches the snapshot, so a rejected edit never
/// reaches the pending ledger.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Value is not in allowed set.
    #[error("{field} '{value}' is not supported")]
    Unsupported { field: String, value: String },
}

// =============================================================================
// Decode Error
// =============================================================================

/// A compact share token could not be turned back into a bill.
///
/// Every variant means the same thing to a caller: the bill was not found.
/// The variants only exist so logs can say which stage gave up.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Token contains characters outside the URL-safe base64 alphabet.
    #[error("token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Inflating the payload failed or exceeded the size limit.
    #[error("token payload could not be decompressed: {0}")]
    Compression(String),

    /// Payload is not the expected JSON document.
    #[error("token payload is not a compact bill: {0}")]
    Payload(#[from] serde_json::Error),

    /// Payload parsed but references things that do not exist.
    #[error("compact bill is inconsistent: {0}")]
    Shape(String),
}

/// A bill could not be packed into a compact token.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("could not serialize compact bill: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not compress compact bill: {0}")]
    Compress(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::ItemNotFound("item-1".to_string());
        assert_eq!(err.to_string(), "Item not found: item-1");

        let err = ValidationError::Required {
            field: "description".to_string(),
        };
        assert_eq!(err.to_string(), "description is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Negative {
            field: "price_cents".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
