//! # Core Data Models for the Device Registry
//!
//! Explicit record shapes for registered devices and the outcomes of a
//! registration. The registry stores public key bytes opaquely; decoding and
//! validating them is the caller's job.
//!
//! ## Uniqueness
//!
//! | Field | Unique | Assigned by |
//! |-------|--------|-------------|
//! | `device_ref` | yes | storage |
//! | `installation_id` | yes | client |
//! | `public_key_id` | yes | client |
//! | `sequence` | yes | registry |
//! | `device_fingerprint` | no (duplicate detection only) | client |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage-internal identifier of a device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRef(pub u64);

impl DeviceRef {
    /// Big-endian key bytes, so that storage order matches numeric order.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decodes key bytes written by [`DeviceRef::to_key`].
    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(u64::from_be_bytes(raw)))
    }
}

impl std::fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registration request, already validated by the caller.
///
/// `public_key_bytes` is expected to be a compressed curve point; the
/// registry itself does not inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    /// Client-assigned installation identifier, the idempotency key.
    pub installation_id: String,

    /// Device model, e.g. "Pixel 8".
    pub device_model: String,

    /// Operating system name.
    pub os_name: String,

    /// Operating system version.
    pub os_version: String,

    /// Client-chosen identifier used to look the key up at verification time.
    pub public_key_id: String,

    /// Raw public key bytes.
    pub public_key_bytes: Vec<u8>,

    /// Short digest of the public key for display.
    pub public_key_fingerprint: String,

    /// Client-derived fingerprint of local device attributes.
    pub device_fingerprint: String,
}

/// A stored device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Storage-internal identifier.
    pub device_ref: DeviceRef,

    /// Client-assigned installation identifier.
    pub installation_id: String,

    /// Device model.
    pub device_model: String,

    /// Operating system name.
    pub os_name: String,

    /// Operating system version.
    pub os_version: String,

    /// Verification lookup key.
    pub public_key_id: String,

    /// Raw public key bytes. Never changes after creation.
    pub public_key_bytes: Vec<u8>,

    /// Short digest of the public key.
    pub public_key_fingerprint: String,

    /// Client-derived device fingerprint.
    pub device_fingerprint: String,

    /// Dense, registry-assigned identity ("device #N"). Never changes.
    pub sequence: u64,

    /// When the record was created.
    pub registration_timestamp: DateTime<Utc>,

    /// Last re-registration or successful verification.
    pub last_activity: DateTime<Utc>,

    /// Inactive devices are kept but not used for verification.
    pub is_active: bool,
}

impl DeviceRecord {
    /// Builds the record for a fresh registration.
    pub fn new(
        device_ref: DeviceRef,
        registration: &DeviceRegistration,
        sequence: u64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            device_ref,
            installation_id: registration.installation_id.clone(),
            device_model: registration.device_model.clone(),
            os_name: registration.os_name.clone(),
            os_version: registration.os_version.clone(),
            public_key_id: registration.public_key_id.clone(),
            public_key_bytes: registration.public_key_bytes.clone(),
            public_key_fingerprint: registration.public_key_fingerprint.clone(),
            device_fingerprint: registration.device_fingerprint.clone(),
            sequence,
            registration_timestamp: at,
            last_activity: at,
            is_active: true,
        }
    }

    /// Human-facing name, e.g. `Device7`.
    pub fn display_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.sequence)
    }
}

/// Result of [`crate::DeviceRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// The new or existing record.
    pub device_ref: DeviceRef,

    /// The record's sequence.
    pub sequence: u64,

    /// False when an existing record matched and was reused.
    pub created: bool,
}

/// Which unique identity of a registration was already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    /// `installation_id`
    InstallationId,
    /// `public_key_id`
    PublicKeyId,
    /// `device_fingerprint`
    DeviceFingerprint,
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InstallationId => "installation_id",
            Self::PublicKeyId => "public_key_id",
            Self::DeviceFingerprint => "device_fingerprint",
        };
        f.write_str(name)
    }
}

/// Outcome of a single insert attempt against the store.
///
/// Uniqueness violations are expected under concurrency and are reported
/// here rather than as errors. Only genuine storage faults are `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written.
    Inserted(DeviceRecord),

    /// Another record already holds this sequence. Nothing was written.
    SequenceTaken(u64),

    /// Another record already holds one of the device's identities.
    /// Nothing was written.
    IdentityTaken(IdentityField),
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The storage engine failed or is unavailable.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sequence allocation lost every race within the retry bound.
    #[error("Sequence allocation exhausted after {attempts} attempts")]
    SequenceExhausted {
        /// Number of insert attempts made
        attempts: u32,
    },

    /// No device with this public key id.
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Indexes and records disagree.
    #[error("Corrupt registry state: {0}")]
    Corrupt(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> DeviceRegistration {
        DeviceRegistration {
            installation_id: "install-1".to_string(),
            device_model: "Pixel 8".to_string(),
            os_name: "Android".to_string(),
            os_version: "15".to_string(),
            public_key_id: "key-1".to_string(),
            public_key_bytes: vec![0x02; 33],
            public_key_fingerprint: "0011223344556677".to_string(),
            device_fingerprint: "fp-1".to_string(),
        }
    }

    #[test]
    fn test_device_ref_key_order() {
        let a = DeviceRef(1).to_key();
        let b = DeviceRef(256).to_key();
        assert!(a < b);
        assert_eq!(DeviceRef::from_key(&b), Some(DeviceRef(256)));
        assert_eq!(DeviceRef::from_key(&[1, 2, 3]), None);
    }

    #[test]
    fn test_new_record_is_active() {
        let now = Utc::now();
        let record = DeviceRecord::new(DeviceRef(9), &registration(), 4, now);

        assert!(record.is_active);
        assert_eq!(record.sequence, 4);
        assert_eq!(record.registration_timestamp, record.last_activity);
        assert_eq!(record.display_name("Device"), "Device4");
    }

    #[test]
    fn test_record_serialization() {
        let record = DeviceRecord::new(DeviceRef(1), &registration(), 1, Utc::now());
        let json = serde_json::to_vec(&record).unwrap();
        let parsed: DeviceRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(record, parsed);
    }
}
