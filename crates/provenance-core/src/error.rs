//! Error types for Provenance Core.
//!
//! Only conditions under which an operation did not complete are errors.
//! Everything a verification can conclude about its input is a
//! [`FailureReason`](crate::FailureReason) on the verdict instead.

use provenance_audit::AuditError;
use provenance_registry::RegistryError;
use thiserror::Error;

/// Core error type for provenance operations.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// Registration lost every sequence race. The caller may retry.
    #[error("Sequence allocation exhausted after {attempts} attempts")]
    SequenceExhausted {
        /// Insert attempts made
        attempts: u32,
    },

    /// The storage collaborator failed. Never retried here.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The submitted public key is not a compressed secp256k1 point.
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// The submitted key algorithm is not supported.
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A required registration field is empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Image payload exceeds the configured limit.
    #[error("Content too large: {size} bytes exceeds {limit}")]
    ContentTooLarge {
        /// Submitted size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// No device with this public key id.
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<RegistryError> for ProvenanceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SequenceExhausted { attempts } => Self::SequenceExhausted { attempts },
            RegistryError::NotFound(key) => Self::NotFound(key),
            other => Self::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<AuditError> for ProvenanceError {
    fn from(err: AuditError) -> Self {
        match err {
            err @ AuditError::InvalidWindow(_) => Self::Config(err.to_string()),
            other => Self::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<sled::Error> for ProvenanceError {
    fn from(err: sled::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_errors_collapse() {
        let exhausted: ProvenanceError = RegistryError::SequenceExhausted { attempts: 3 }.into();
        assert!(matches!(
            exhausted,
            ProvenanceError::SequenceExhausted { attempts: 3 }
        ));

        let storage: ProvenanceError =
            RegistryError::Database(sled::Error::Unsupported("offline".to_string())).into();
        assert!(matches!(storage, ProvenanceError::StorageUnavailable(_)));

        let missing: ProvenanceError = RegistryError::NotFound("k9".to_string()).into();
        assert!(matches!(missing, ProvenanceError::NotFound(ref key) if key == "k9"));
    }

    #[test]
    fn test_audit_error_mapping() {
        let err: ProvenanceError = AuditError::Corrupt("bad key".to_string()).into();
        assert!(err.to_string().starts_with("Storage unavailable"));

        let err: ProvenanceError = AuditError::InvalidWindow("window".to_string()).into();
        assert!(matches!(err, ProvenanceError::Config(_)));
    }
}
