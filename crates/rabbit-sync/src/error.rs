//! # Sync Error Types
//!
//! Error types for edit sessions, flushes and share links.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Session     │  │     Remote              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Rejected       │  │  Remote                 │ │
//! │  │  InvalidUrl     │  │  TabNotFound    │  │  Timeout                │ │
//! │  │  ConfigLoad/Save│  │  NotReady       │  │  ShareStore             │ │
//! │  │                 │  │  SessionClosed  │  │  FlushFailed            │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Flush failures are never fatal: the batch is kept for the next flush.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rabbit_core::{CoreError, EncodeError};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every session, flush and share failure.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid share base URL or share link.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// An edit was rejected before it touched the snapshot.
    #[error("Rejected edit: {0}")]
    Rejected(#[from] CoreError),

    /// The tab does not exist in the remote store.
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    /// The session has not finished loading.
    #[error("Session is still loading")]
    NotReady,

    /// The session was closed.
    #[error("Session is closed")]
    SessionClosed,

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The remote relational store rejected or failed an operation.
    #[error("Remote store error: {0}")]
    Remote(String),

    /// A remote call did not finish in time.
    #[error("Remote call timed out after {0} seconds")]
    Timeout(u64),

    /// The key-value store behind short links failed.
    #[error("Share store error: {0}")]
    ShareStore(String),

    /// A flush failed; the changes are kept for the next attempt.
    #[error("Flush failed: {0}")]
    FlushFailed(String),

    // =========================================================================
    // Share Errors
    // =========================================================================
    /// A bill could not be turned into a compact token.
    #[error("Could not encode bill: {0}")]
    Encode(#[from] EncodeError),

    /// Failed to serialize a snapshot.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<rabbit_db::DbError> for SyncError {
    fn from(err: rabbit_db::DbError) -> Self {
        SyncError::Remote(err.to_string())
    }
}

impl From<redis::RedisError> for SyncError {
    fn from(err: redis::RedisError) -> Self {
        SyncError::ShareStore(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if repeating the operation later may succeed.
    ///
    /// ## Retryable Errors
    /// - Remote store failures (network, busy database)
    /// - Timeouts
    /// - Share store failures
    /// - Failed flushes
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Rejected edits
    /// - Closed sessions
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Remote(_)
                | SyncError::Timeout(_)
                | SyncError::ShareStore(_)
                | SyncError::FlushFailed(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabbit_core::ValidationError;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Remote("connection reset".into()).is_retryable());
        assert!(SyncError::Timeout(15).is_retryable());
        assert!(SyncError::FlushFailed("x".into()).is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::SessionClosed.is_retryable());
        assert!(!SyncError::TabNotFound("t".into()).is_retryable());
    }

    #[test]
    fn test_rejected_edit_wraps_core_error() {
        let core = CoreError::Validation(ValidationError::Negative {
            field: "price_cents".into(),
        });
        let err: SyncError = core.into();
        assert!(matches!(err, SyncError::Rejected(_)));
        assert!(err.to_string().contains("price_cents"));
    }

    #[test]
    fn test_db_error_is_remote() {
        let err: SyncError = rabbit_db::DbError::PoolExhausted.into();
        assert!(matches!(err, SyncError::Remote(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
        assert!(!SyncError::Timeout(1).is_config_error());
    }
}
