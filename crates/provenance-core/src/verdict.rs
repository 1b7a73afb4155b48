//! Verdict types for verification results.

use chrono::{DateTime, Utc};
use provenance_registry::DeviceRecord;
use serde::{Deserialize, Serialize};

/// Reason code stored in the audit log for a successful verification.
pub const OK_REASON: &str = "ok";

/// The structured result of one verification attempt.
///
/// A verdict is always produced for well-formed or malformed input alike;
/// `reason` and `checks` say how far the attempt got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the signature verified.
    pub valid: bool,

    /// Why verification failed. `None` exactly when `valid` is true.
    pub reason: Option<FailureReason>,

    /// Which pipeline stages passed.
    pub checks: StageChecks,

    /// Human-readable explanation of the failure.
    pub detail: Option<String>,

    /// The digest as submitted.
    pub content_digest: String,

    /// When the verdict was reached.
    pub verified_at: DateTime<Utc>,

    /// The device behind the key id, when it resolved.
    pub device: Option<DeviceSummary>,
}

impl Verdict {
    /// A successful verdict. All stages passed.
    pub fn verified(content_digest: impl Into<String>, verified_at: DateTime<Utc>) -> Self {
        Self {
            valid: true,
            reason: None,
            checks: StageChecks::all_passed(),
            detail: None,
            content_digest: content_digest.into(),
            verified_at,
            device: None,
        }
    }

    /// A failed verdict with the stages that passed before the failure.
    pub fn failed(
        reason: FailureReason,
        detail: impl Into<String>,
        checks: StageChecks,
        content_digest: impl Into<String>,
        verified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            checks,
            detail: Some(detail.into()),
            content_digest: content_digest.into(),
            verified_at,
            device: None,
        }
    }

    /// Attaches the device summary.
    pub fn with_device(mut self, device: Option<DeviceSummary>) -> Self {
        self.device = device;
        self
    }

    /// Reason code for the audit log, `"ok"` on success.
    pub fn reason_code(&self) -> &'static str {
        self.reason.map_or(OK_REASON, |reason| reason.as_str())
    }
}

/// Why a verification failed. One variant per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No active device has this public key id.
    KeyNotFound,

    /// The signature is not 64 bytes of base64.
    BadSignatureFormat,

    /// The stored key failed re-validation. A data-integrity fault.
    BadStoredKey,

    /// The digest is not 128 hex characters.
    BadDigestFormat,

    /// The claimed timestamp is unparsable or outside the replay window.
    Stale,

    /// The signature does not verify.
    SignatureMismatch,
}

impl FailureReason {
    /// Stable snake_case code, as stored in the audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "key_not_found",
            Self::BadSignatureFormat => "bad_signature_format",
            Self::BadStoredKey => "bad_stored_key",
            Self::BadDigestFormat => "bad_digest_format",
            Self::Stale => "stale",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pass/fail record of every pipeline stage, in execution order.
///
/// Stages after the first failure never ran and stay `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChecks {
    /// Key id resolved to an active device.
    pub key_found: bool,

    /// Signature decoded to 64 bytes.
    pub signature_format: bool,

    /// Stored key re-validated as a compressed point.
    pub public_key_format: bool,

    /// Digest decoded to 64 bytes.
    pub digest_format: bool,

    /// Timestamp inside the replay window.
    pub timestamp_valid: bool,

    /// Signature verified.
    pub signature_verified: bool,
}

impl StageChecks {
    /// Every stage passed.
    pub fn all_passed() -> Self {
        Self {
            key_found: true,
            signature_format: true,
            public_key_format: true,
            digest_format: true,
            timestamp_valid: true,
            signature_verified: true,
        }
    }

    /// Number of stages that passed.
    pub fn passed(&self) -> usize {
        [
            self.key_found,
            self.signature_format,
            self.public_key_format,
            self.digest_format,
            self.timestamp_valid,
            self.signature_verified,
        ]
        .iter()
        .filter(|passed| **passed)
        .count()
    }
}

/// Public view of the device a verdict refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Human-facing name, e.g. `Device7`.
    pub display_name: String,

    /// Registry sequence.
    pub sequence: u64,

    /// Device model.
    pub device_model: String,

    /// Operating system name.
    pub os_name: String,

    /// Operating system version.
    pub os_version: String,

    /// When the device registered.
    pub registered_at: DateTime<Utc>,

    /// Short digest of the device's public key.
    pub public_key_fingerprint: String,
}

impl DeviceSummary {
    /// Summarizes a record using the configured name prefix.
    pub fn from_record(record: &DeviceRecord, display_prefix: &str) -> Self {
        Self {
            display_name: record.display_name(display_prefix),
            sequence: record.sequence,
            device_model: record.device_model.clone(),
            os_name: record.os_name.clone(),
            os_version: record.os_version.clone(),
            registered_at: record.registration_timestamp,
            public_key_fingerprint: record.public_key_fingerprint.clone(),
        }
    }
}
