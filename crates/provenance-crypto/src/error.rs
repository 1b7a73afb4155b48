//! Error types for key material decoding and replay checks.
//!
//! These errors describe client input faults. They never reach the caller of
//! a verification as hard errors: the verification engine converts each of
//! them into a failure reason on the verdict.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, FormatError>;

/// Malformed wire encoding of a signature, public key or digest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The signature is not valid base64.
    #[error("invalid signature encoding")]
    SignatureEncoding,

    /// The decoded signature does not have the compact `r || s` length.
    #[error("invalid signature length: expected {expected} bytes, got {actual}")]
    SignatureLength {
        /// Required length in bytes
        expected: usize,
        /// Length actually decoded
        actual: usize,
    },

    /// The public key is not valid base64.
    #[error("invalid public key encoding")]
    PublicKeyEncoding,

    /// The decoded public key is not a compressed point.
    #[error("invalid public key length: expected {expected} bytes, got {actual}")]
    PublicKeyLength {
        /// Required length in bytes
        expected: usize,
        /// Length actually decoded
        actual: usize,
    },

    /// The first byte is not a compressed-point parity prefix.
    #[error("invalid compressed public key prefix: 0x{0:02x}")]
    PublicKeyPrefix(u8),

    /// The digest hex string has the wrong number of characters.
    #[error("invalid digest length: expected {expected} hex characters, got {actual}")]
    DigestLength {
        /// Required number of hex characters
        expected: usize,
        /// Number of characters supplied
        actual: usize,
    },

    /// The digest contains non-hex characters.
    #[error("invalid digest encoding")]
    DigestEncoding,
}

/// A claimed timestamp that failed the replay window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// The timestamp could not be parsed. Treated as stale, never skipped.
    #[error("unparsable timestamp: {0:?}")]
    Unparsable(String),

    /// The timestamp lies outside the tolerated window, in either direction.
    #[error("timestamp skew of {skew_secs}s exceeds the {window_secs}s window")]
    OutsideWindow {
        /// Absolute difference between the claimed time and now
        skew_secs: i64,
        /// Configured tolerance
        window_secs: u64,
    },
}
