//! # Provenance Core
//!
//! Device identity registration and image signature verification.
//! Composes the device registry, the key material codec, the replay guard,
//! the secp256k1 verifier and the audit log behind one facade.
//!
//! ## Failure Coverage
//!
//! | Stage | Component | Rejects |
//! |-------|-----------|---------|
//! | Key lookup | Device Registry | Unknown or deactivated key ids |
//! | Decoding | Key Material Codec | Malformed signatures, stored keys, digests |
//! | Freshness | Replay Guard | Replayed or clock-skewed claims |
//! | Cryptography | Signature Verifier | Forged or tampered signatures |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       PROVENANCE CORE                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌─────────────────┐                          │
//! │                    │   Provenance    │  ← Unified Facade        │
//! │                    └────────┬────────┘                          │
//! │                             │                                   │
//! │          ┌──────────────────┼───────────────────┐               │
//! │          ▼                  ▼                   ▼               │
//! │  ┌──────────────┐  ┌─────────────────┐  ┌─────────────┐         │
//! │  │   Device     │◀─│  Verification   │─▶│    Audit    │         │
//! │  │   Registry   │  │     Engine      │  │     Log     │         │
//! │  └──────────────┘  └────────┬────────┘  └─────────────┘         │
//! │                             ▼                                   │
//! │                 codec → replay → verifier                       │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use provenance_core::{Provenance, ProvenanceConfig, VerificationRequest};
//!
//! let provenance = Provenance::new(ProvenanceConfig::from_file("provenance.toml")?)?;
//!
//! let registration = provenance.register(&request)?;
//! println!("device #{}", registration.sequence);
//!
//! let verdict = provenance.verify_image_signature(&VerificationRequest::new(
//!     digest_hex, signature_b64, "k1", timestamp,
//! ))?;
//! if !verdict.valid {
//!     println!("rejected: {:?} {:?}", verdict.reason, verdict.checks);
//! }
//! ```
//!
//! ## Security Notes
//!
//! - Stages run in a fixed order and stop at the first failure
//! - Cryptographic ambiguity resolves to "not verified", never to an error
//! - Every verification writes one audit entry before returning
//! - Unparsable timestamps fail the replay check; they are never skipped
//!
//! ## References
//!
//! - SEC 1 v2: compressed point encoding
//! - SEC 2 v2: secp256k1 domain parameters

mod config;
mod engine;
mod error;
mod provenance;
mod request;
mod verdict;

pub use config::{AuditConfig, ProvenanceConfig, RegistryConfig, StorageConfig, VerificationConfig};
pub use engine::VerificationEngine;
pub use error::ProvenanceError;
pub use provenance::{FleetSummary, LatestRegistration, Provenance};
pub use request::{PublicKeyInput, RegisterRequest, VerificationRequest, UNKNOWN_OS};
pub use verdict::{DeviceSummary, FailureReason, StageChecks, Verdict, OK_REASON};

// Re-export component types for convenience
pub use provenance_audit::{AttemptContext, AuditEntry, AuditLog, AuditStats, VerificationAttempt};
pub use provenance_crypto::{hash_content, public_key_fingerprint, SignatureCheck};
pub use provenance_registry::{DeviceRecord, DeviceRef, DeviceRegistry, Registration};

/// Core result type for provenance operations.
pub type Result<T> = std::result::Result<T, ProvenanceError>;
