//! The unified Provenance facade.
//!
//! [`Provenance`] owns one sled database shared by the device registry and
//! the audit log, and exposes the operations a transport layer calls:
//! registration, lookups, signature verification and statistics.

use crate::{
    config::ProvenanceConfig,
    engine::VerificationEngine,
    error::ProvenanceError,
    request::{RegisterRequest, VerificationRequest, UNKNOWN_OS},
    verdict::Verdict,
    Result,
};

use chrono::{DateTime, Duration, Utc};
use provenance_audit::{AttemptContext, AuditEntry, AuditLog, AuditStats};
use provenance_crypto::{decode_public_key, hash_content, public_key_fingerprint};
use provenance_registry::{DeviceRecord, DeviceRegistration, DeviceRegistry, Registration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Device counts and the newest registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    /// All registered devices, active or not.
    pub total_devices: usize,

    /// Devices that can currently verify.
    pub active_devices: usize,

    /// The device with the highest sequence.
    pub latest: Option<LatestRegistration>,
}

/// The newest registration in a [`FleetSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRegistration {
    /// Human-facing name.
    pub display_name: String,

    /// Device model.
    pub device_model: String,

    /// When it registered.
    pub registered_at: DateTime<Utc>,
}

/// The unified provenance facade.
///
/// # Security Model
///
/// - Registration stores only structurally valid compressed keys.
/// - Every verification call writes exactly one audit entry, whatever the
///   outcome, before the verdict is returned.
/// - Only storage faults and sequence exhaustion surface as errors; all
///   input faults become verdict reasons.
///
/// # Example
///
/// ```rust
/// use provenance_core::{Provenance, ProvenanceConfig};
///
/// let provenance = Provenance::new(ProvenanceConfig::temporary()).unwrap();
/// let stats = provenance.stats().unwrap();
/// assert_eq!(stats.total, 0);
/// assert_eq!(stats.success_rate, 0.0);
/// ```
pub struct Provenance {
    config: ProvenanceConfig,
    registry: DeviceRegistry,
    audit: AuditLog,
}

impl Provenance {
    /// Opens the database named by `config` and wires up the components.
    ///
    /// # Errors
    ///
    /// - `ProvenanceError::Config` if the configuration is invalid
    /// - `ProvenanceError::StorageUnavailable` if the database cannot be opened
    pub fn new(config: ProvenanceConfig) -> Result<Self> {
        config.validate()?;

        let db = if config.storage.temporary {
            sled::Config::new().temporary(true).open()?
        } else {
            sled::open(&config.storage.db_path)?
        };

        let registry = DeviceRegistry::from_db(&db)?;
        let audit = AuditLog::from_db(&db)?;

        info!(
            devices = registry.len(),
            attempts = audit.len(),
            temporary = config.storage.temporary,
            "provenance store opened"
        );

        Ok(Self {
            config,
            registry,
            audit,
        })
    }

    /// In-memory instance with default settings.
    pub fn temporary() -> Result<Self> {
        Self::new(ProvenanceConfig::temporary())
    }

    /// The active configuration.
    pub fn config(&self) -> &ProvenanceConfig {
        &self.config
    }

    /// Validates and registers a device.
    ///
    /// Re-registration with any known identity returns the existing
    /// sequence with `created = false`.
    ///
    /// # Errors
    ///
    /// - `MissingField` / `UnsupportedAlgorithm` / `InvalidKey` for bad input
    /// - `SequenceExhausted` when contention outlasted the retry bound
    /// - `StorageUnavailable` on storage faults
    pub fn register(&self, request: &RegisterRequest) -> Result<Registration> {
        let registration = self.validate_registration(request)?;
        Ok(self.registry.register(&registration)?)
    }

    fn validate_registration(&self, request: &RegisterRequest) -> Result<DeviceRegistration> {
        for (name, value) in [
            ("installation_id", &request.installation_id),
            ("device_model", &request.device_model),
            ("public_key.id", &request.public_key.id),
            ("public_key.bytes", &request.public_key.bytes),
            ("device_fingerprint", &request.device_fingerprint),
        ] {
            if value.trim().is_empty() {
                return Err(ProvenanceError::MissingField(name));
            }
        }

        if request.public_key.algorithm != self.config.registry.supported_algorithm {
            return Err(ProvenanceError::UnsupportedAlgorithm(
                request.public_key.algorithm.clone(),
            ));
        }

        let key = decode_public_key(&request.public_key.bytes)
            .map_err(|e| ProvenanceError::InvalidKey(e.to_string()))?;

        let fingerprint = match request.public_key.fingerprint.as_deref() {
            Some(given) if !given.trim().is_empty() => given.to_string(),
            _ => public_key_fingerprint(&key),
        };

        let or_unknown = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(UNKNOWN_OS)
                .to_string()
        };

        Ok(DeviceRegistration {
            installation_id: request.installation_id.clone(),
            device_model: request.device_model.clone(),
            os_name: or_unknown(&request.os_name),
            os_version: or_unknown(&request.os_version),
            public_key_id: request.public_key.id.clone(),
            public_key_bytes: key.to_vec(),
            public_key_fingerprint: fingerprint,
            device_fingerprint: request.device_fingerprint.clone(),
        })
    }

    /// Looks up a device by public key id.
    pub fn lookup(&self, public_key_id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.registry.lookup(public_key_id)?)
    }

    /// Looks up a device by installation id.
    pub fn lookup_installation(&self, installation_id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.registry.lookup_installation(installation_id)?)
    }

    /// All devices ordered by ascending sequence.
    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.registry.list_all()?)
    }

    /// Activates or deactivates a device.
    ///
    /// Inactive devices verify as `KeyNotFound`.
    pub fn set_active(&self, public_key_id: &str, active: bool) -> Result<DeviceRecord> {
        Ok(self.registry.set_active(public_key_id, active)?)
    }

    /// Human-facing name of a device, e.g. `Device7`.
    pub fn display_name(&self, record: &DeviceRecord) -> String {
        record.display_name(&self.config.registry.display_prefix)
    }

    /// Runs a signature claim through the verification pipeline.
    ///
    /// Writes exactly one audit entry.
    pub fn verify_image_signature(&self, request: &VerificationRequest) -> Result<Verdict> {
        self.engine().verify(request)
    }

    /// Like [`Provenance::verify_image_signature`] with an explicit
    /// reference time.
    pub fn verify_image_signature_at(
        &self,
        request: &VerificationRequest,
        now: DateTime<Utc>,
    ) -> Result<Verdict> {
        self.engine().verify_at(request, now)
    }

    /// Hashes raw image bytes and verifies the signature over the digest.
    ///
    /// # Errors
    ///
    /// `ProvenanceError::ContentTooLarge` if `image` exceeds the configured
    /// limit. Nothing is logged in that case.
    pub fn verify_image(
        &self,
        image: &[u8],
        signature: &str,
        public_key_id: &str,
        claimed_timestamp: &str,
        context: AttemptContext,
    ) -> Result<Verdict> {
        let limit = self.config.verification.max_content_bytes;
        if image.len() > limit {
            return Err(ProvenanceError::ContentTooLarge {
                size: image.len(),
                limit,
            });
        }

        let digest = hash_content(image);
        debug!(bytes = image.len(), %digest, "image hashed");

        let request = VerificationRequest::new(digest, signature, public_key_id, claimed_timestamp)
            .with_context(context);
        self.verify_image_signature(&request)
    }

    /// Aggregate verification statistics.
    pub fn stats(&self) -> Result<AuditStats> {
        let hours = self.config.audit.recent_window_hours;
        let window = Duration::try_hours(hours).ok_or_else(|| {
            ProvenanceError::Config(format!("audit.recent_window_hours out of range: {}", hours))
        })?;
        Ok(self.audit.stats(window)?)
    }

    /// Device counts and the newest registration.
    pub fn fleet_summary(&self) -> Result<FleetSummary> {
        let devices = self.registry.list_all()?;
        let latest = devices.last().map(|record| LatestRegistration {
            display_name: self.display_name(record),
            device_model: record.device_model.clone(),
            registered_at: record.registration_timestamp,
        });

        Ok(FleetSummary {
            total_devices: devices.len(),
            active_devices: devices.iter().filter(|record| record.is_active).count(),
            latest,
        })
    }

    /// The newest audit entries, newest first.
    pub fn recent_attempts(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        Ok(self.audit.recent(limit)?)
    }

    /// Audit entries of one device, oldest first.
    ///
    /// # Errors
    ///
    /// `ProvenanceError::NotFound` for an unknown key id.
    pub fn device_attempts(&self, public_key_id: &str) -> Result<Vec<AuditEntry>> {
        let record = self
            .registry
            .lookup(public_key_id)?
            .ok_or_else(|| ProvenanceError::NotFound(public_key_id.to_string()))?;
        Ok(self.audit.for_device(record.device_ref)?)
    }

    /// Flushes registry and audit writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.registry.flush()?;
        self.audit.flush()?;
        Ok(())
    }

    fn engine(&self) -> VerificationEngine<'_> {
        VerificationEngine::new(&self.registry, &self.audit)
            .with_replay_window(self.config.verification.replay_window_secs)
            .with_display_prefix(&self.config.registry.display_prefix)
            .with_raw_signature_recording(self.config.verification.record_raw_signature)
    }
}

impl std::fmt::Debug for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provenance")
            .field("registry", &self.registry)
            .field("audit", &self.audit)
            .finish()
    }
}
