//! Error types for the audit log.

use thiserror::Error;

/// Errors from audit storage.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Attempt (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The statistics window reaches outside the representable time range.
    #[error("Invalid statistics window: {0}")]
    InvalidWindow(String),

    /// A stored key was not a valid attempt id.
    #[error("Corrupt audit entry: {0}")]
    Corrupt(String),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
