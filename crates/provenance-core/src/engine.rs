//! # Verification Engine
//!
//! Runs one signature claim through the fixed stage pipeline, writes exactly
//! one audit entry, and returns the verdict.
//!
//! ```text
//!   request
//!      │
//!      ▼
//!   1. key lookup ─────────── KeyNotFound
//!   2. signature decode ───── BadSignatureFormat
//!   3. stored key check ───── BadStoredKey
//!   4. digest decode ──────── BadDigestFormat
//!   5. replay window ──────── Stale
//!   6. secp256k1 verify ───── SignatureMismatch
//!      │
//!      ▼
//!   audit append (always) ──▶ activity bump (on success, best-effort)
//! ```
//!
//! Each stage runs only if every earlier stage passed. A stage failure is a
//! verdict, never an error: the only hard errors are storage faults during
//! key lookup or audit append, where no verdict can be recorded.

use crate::request::VerificationRequest;
use crate::verdict::{DeviceSummary, FailureReason, StageChecks, Verdict};
use crate::Result;
use chrono::{DateTime, Utc};
use provenance_audit::{AuditLog, VerificationAttempt};
use provenance_crypto::{
    decode_digest, decode_signature, validate_public_key, ReplayGuard, SignatureCheck,
    SignatureVerifier,
};
use provenance_registry::{DeviceRecord, DeviceRegistry, DeviceStore, SledDeviceStore};
use tracing::{debug, info, warn};

/// A stage that stopped the pipeline.
struct StageFailure {
    reason: FailureReason,
    detail: String,
}

impl StageFailure {
    fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Verification pipeline over a registry and an audit log.
///
/// Borrowed views only; building one per call is free.
///
/// # Example
///
/// ```rust
/// use provenance_audit::AuditLog;
/// use provenance_core::{FailureReason, VerificationEngine, VerificationRequest};
/// use provenance_registry::DeviceRegistry;
///
/// let registry = DeviceRegistry::temporary().unwrap();
/// let audit = AuditLog::temporary().unwrap();
/// let engine = VerificationEngine::new(&registry, &audit);
///
/// let request = VerificationRequest::new("0".repeat(128), "AAAA", "unknown", "now");
/// let verdict = engine.verify(&request).unwrap();
///
/// assert_eq!(verdict.reason, Some(FailureReason::KeyNotFound));
/// assert_eq!(audit.len(), 1);
/// ```
pub struct VerificationEngine<'a, S: DeviceStore = SledDeviceStore> {
    registry: &'a DeviceRegistry<S>,
    audit: &'a AuditLog,
    replay: ReplayGuard,
    verifier: SignatureVerifier,
    display_prefix: &'a str,
    record_raw_signature: bool,
}

impl<'a, S: DeviceStore> VerificationEngine<'a, S> {
    /// Creates an engine with the default replay window.
    pub fn new(registry: &'a DeviceRegistry<S>, audit: &'a AuditLog) -> Self {
        Self {
            registry,
            audit,
            replay: ReplayGuard::default(),
            verifier: SignatureVerifier::new(),
            display_prefix: "Device",
            record_raw_signature: true,
        }
    }

    /// Set the replay window in seconds.
    pub fn with_replay_window(mut self, window_secs: u64) -> Self {
        self.replay = ReplayGuard::new(window_secs);
        self
    }

    /// Set the prefix used for device display names.
    pub fn with_display_prefix(mut self, prefix: &'a str) -> Self {
        self.display_prefix = prefix;
        self
    }

    /// Whether the submitted signature is kept on the audit entry.
    pub fn with_raw_signature_recording(mut self, enabled: bool) -> Self {
        self.record_raw_signature = enabled;
        self
    }

    /// Verifies a claim against the current time.
    pub fn verify(&self, request: &VerificationRequest) -> Result<Verdict> {
        self.verify_at(request, Utc::now())
    }

    /// Verifies a claim against an explicit reference time.
    ///
    /// # Errors
    ///
    /// `ProvenanceError::StorageUnavailable` if the key lookup or the audit
    /// append fails. Every other outcome is a verdict.
    pub fn verify_at(&self, request: &VerificationRequest, now: DateTime<Utc>) -> Result<Verdict> {
        debug!(public_key_id = %request.public_key_id, "verifying signature claim");

        let device = self
            .registry
            .lookup(&request.public_key_id)?
            .filter(|record| record.is_active);

        let mut checks = StageChecks::default();
        let outcome = self.run_stages(request, device.as_ref(), now, &mut checks);

        let summary = device
            .as_ref()
            .map(|record| DeviceSummary::from_record(record, self.display_prefix));

        let verdict = match outcome {
            Ok(()) => Verdict::verified(&request.content_digest, now),
            Err(failure) => {
                warn!(
                    public_key_id = %request.public_key_id,
                    reason = %failure.reason,
                    detail = %failure.detail,
                    "verification failed"
                );
                Verdict::failed(
                    failure.reason,
                    failure.detail,
                    checks,
                    &request.content_digest,
                    now,
                )
            }
        }
        .with_device(summary);

        self.audit.append(&VerificationAttempt {
            device_ref: device.as_ref().map(|record| record.device_ref),
            public_key_id: request.public_key_id.clone(),
            content_digest: request.content_digest.clone(),
            verdict: verdict.valid,
            reason: verdict.reason_code().to_string(),
            raw_signature: self
                .record_raw_signature
                .then(|| request.signature.clone()),
            context: request.context.clone(),
            timestamp: now,
        })?;

        if let (true, Some(record)) = (verdict.valid, device.as_ref()) {
            info!(
                public_key_id = %request.public_key_id,
                sequence = record.sequence,
                "signature verified"
            );
            self.bump_activity(record);
        }

        Ok(verdict)
    }

    /// Stages 1 to 6. Marks each passed stage in `checks`.
    fn run_stages(
        &self,
        request: &VerificationRequest,
        device: Option<&DeviceRecord>,
        now: DateTime<Utc>,
        checks: &mut StageChecks,
    ) -> std::result::Result<(), StageFailure> {
        let device = device.ok_or_else(|| {
            StageFailure::new(
                FailureReason::KeyNotFound,
                format!("no active device for key id {:?}", request.public_key_id),
            )
        })?;
        checks.key_found = true;

        let signature = decode_signature(&request.signature)
            .map_err(|e| StageFailure::new(FailureReason::BadSignatureFormat, e.to_string()))?;
        checks.signature_format = true;

        let public_key = validate_public_key(&device.public_key_bytes)
            .map_err(|e| StageFailure::new(FailureReason::BadStoredKey, e.to_string()))?;
        checks.public_key_format = true;

        let digest = decode_digest(&request.content_digest)
            .map_err(|e| StageFailure::new(FailureReason::BadDigestFormat, e.to_string()))?;
        checks.digest_format = true;

        self.replay
            .check(&request.claimed_timestamp, now)
            .map_err(|e| StageFailure::new(FailureReason::Stale, e.to_string()))?;
        checks.timestamp_valid = true;

        match self.verifier.verify(&public_key, &signature, &digest) {
            SignatureCheck::Verified => {
                checks.signature_verified = true;
                Ok(())
            }
            SignatureCheck::MalformedKey => Err(StageFailure::new(
                FailureReason::SignatureMismatch,
                "stored key is not a point on the curve",
            )),
            SignatureCheck::MalformedSignature => Err(StageFailure::new(
                FailureReason::SignatureMismatch,
                "signature scalars are out of range",
            )),
            SignatureCheck::Mismatch => Err(StageFailure::new(
                FailureReason::SignatureMismatch,
                "signature does not match key and digest",
            )),
        }
    }

    /// Activity tracking never fails a verification.
    fn bump_activity(&self, record: &DeviceRecord) {
        match self.registry.record_activity(record.device_ref) {
            Ok(true) => {}
            Ok(false) => warn!(
                device_ref = %record.device_ref,
                "device vanished before activity update"
            ),
            Err(e) => warn!(
                device_ref = %record.device_ref,
                error = %e,
                "failed to update device activity"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use provenance_crypto::codec::encode_base64;
    use provenance_registry::DeviceRegistration;

    fn fixture() -> (DeviceRegistry, AuditLog) {
        (
            DeviceRegistry::temporary().unwrap(),
            AuditLog::temporary().unwrap(),
        )
    }

    fn register(registry: &DeviceRegistry, key_id: &str, key: Vec<u8>) {
        registry
            .register(&DeviceRegistration {
                installation_id: format!("install-{}", key_id),
                device_model: "Pixel 8".to_string(),
                os_name: "Android".to_string(),
                os_version: "15".to_string(),
                public_key_id: key_id.to_string(),
                public_key_bytes: key,
                public_key_fingerprint: "0011223344556677".to_string(),
                device_fingerprint: format!("device-{}", key_id),
            })
            .unwrap();
    }

    fn request(key_id: &str, signature: &str, now: DateTime<Utc>) -> VerificationRequest {
        VerificationRequest::new("0".repeat(128), signature, key_id, now.to_rfc3339())
    }

    #[test]
    fn test_unknown_key_stops_at_first_stage() {
        let (registry, audit) = fixture();
        let engine = VerificationEngine::new(&registry, &audit);
        let now = Utc::now();

        let verdict = engine.verify_at(&request("ghost", "%%", now), now).unwrap();

        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(FailureReason::KeyNotFound));
        assert_eq!(verdict.checks, StageChecks::default());
        assert!(verdict.device.is_none());
        assert_eq!(audit.len(), 1);
    }

    #[test]
    fn test_bad_signature_format() {
        let (registry, audit) = fixture();
        register(&registry, "k1", vec![0x02; 33]);
        let engine = VerificationEngine::new(&registry, &audit);
        let now = Utc::now();

        let short = encode_base64(&[1u8; 63]);
        let verdict = engine.verify_at(&request("k1", &short, now), now).unwrap();

        assert_eq!(verdict.reason, Some(FailureReason::BadSignatureFormat));
        assert!(verdict.checks.key_found);
        assert!(!verdict.checks.signature_format);
        assert_eq!(verdict.device.unwrap().display_name, "Device1");
    }

    #[test]
    fn test_bad_stored_key() {
        let (registry, audit) = fixture();
        register(&registry, "k1", vec![0x04; 33]);
        let engine = VerificationEngine::new(&registry, &audit);
        let now = Utc::now();

        let signature = encode_base64(&[1u8; 64]);
        let verdict = engine.verify_at(&request("k1", &signature, now), now).unwrap();

        assert_eq!(verdict.reason, Some(FailureReason::BadStoredKey));
        assert!(verdict.checks.signature_format);
        assert!(!verdict.checks.public_key_format);
    }

    #[test]
    fn test_bad_digest_format() {
        let (registry, audit) = fixture();
        register(&registry, "k1", vec![0x02; 33]);
        let engine = VerificationEngine::new(&registry, &audit);
        let now = Utc::now();

        let mut req = request("k1", &encode_base64(&[1u8; 64]), now);
        req.content_digest = "0".repeat(127);
        let verdict = engine.verify_at(&req, now).unwrap();

        assert_eq!(verdict.reason, Some(FailureReason::BadDigestFormat));
        assert!(verdict.checks.public_key_format);
        assert!(!verdict.checks.digest_format);
    }

    #[test]
    fn test_stale_timestamp() {
        let (registry, audit) = fixture();
        register(&registry, "k1", vec![0x02; 33]);
        let engine = VerificationEngine::new(&registry, &audit).with_replay_window(60);
        let now = Utc::now();

        let req = request("k1", &encode_base64(&[1u8; 64]), now - Duration::seconds(61));
        let verdict = engine.verify_at(&req, now).unwrap();
        assert_eq!(verdict.reason, Some(FailureReason::Stale));
        assert!(verdict.checks.digest_format);

        let mut req = request("k1", &encode_base64(&[1u8; 64]), now);
        req.claimed_timestamp = "yesterday".to_string();
        let verdict = engine.verify_at(&req, now).unwrap();
        assert_eq!(verdict.reason, Some(FailureReason::Stale));
    }

    #[test]
    fn test_off_curve_key_is_mismatch() {
        let (registry, audit) = fixture();
        let mut key = vec![0xffu8; 33];
        key[0] = 0x02;
        register(&registry, "k1", key);
        let engine = VerificationEngine::new(&registry, &audit);
        let now = Utc::now();

        let verdict = engine
            .verify_at(&request("k1", &encode_base64(&[1u8; 64]), now), now)
            .unwrap();

        assert_eq!(verdict.reason, Some(FailureReason::SignatureMismatch));
        assert!(verdict.checks.timestamp_valid);
        assert!(!verdict.checks.signature_verified);
    }

    #[test]
    fn test_inactive_device_is_unknown() {
        let (registry, audit) = fixture();
        register(&registry, "k1", vec![0x02; 33]);
        registry.set_active("k1", false).unwrap();
        let engine = VerificationEngine::new(&registry, &audit);
        let now = Utc::now();

        let verdict = engine.verify_at(&request("k1", "AAAA", now), now).unwrap();

        assert_eq!(verdict.reason, Some(FailureReason::KeyNotFound));
        let entry = &audit.recent(1).unwrap()[0];
        assert_eq!(entry.attempt.device_ref, None);
    }

    #[test]
    fn test_audit_entry_contents() {
        let (registry, audit) = fixture();
        register(&registry, "k1", vec![0x02; 33]);
        let now = Utc::now();

        let recording = VerificationEngine::new(&registry, &audit);
        recording
            .verify_at(&request("k1", "not-base64", now), now)
            .unwrap();

        let silent =
            VerificationEngine::new(&registry, &audit).with_raw_signature_recording(false);
        silent
            .verify_at(&request("k1", "not-base64", now), now)
            .unwrap();

        let entries = audit.recent(2).unwrap();
        assert_eq!(entries[0].attempt.raw_signature, None);
        assert_eq!(
            entries[1].attempt.raw_signature.as_deref(),
            Some("not-base64")
        );
        assert_eq!(entries[1].attempt.reason, "bad_signature_format");
        assert!(entries[1].attempt.device_ref.is_some());
        assert_eq!(entries[1].attempt.timestamp, now);
    }

    #[test]
    fn test_failure_does_not_touch_activity() {
        let (registry, audit) = fixture();
        register(&registry, "k1", vec![0x02; 33]);
        let before = registry.lookup("k1").unwrap().unwrap().last_activity;
        let engine = VerificationEngine::new(&registry, &audit);
        let now = Utc::now();

        engine
            .verify_at(&request("k1", &encode_base64(&[1u8; 64]), now), now)
            .unwrap();

        let after = registry.lookup("k1").unwrap().unwrap().last_activity;
        assert_eq!(before, after);
    }
}
