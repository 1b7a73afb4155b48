//! # Device Registry - Main Facade
//!
//! Idempotent device registration with a dense, collision-safe sequence
//! allocator, plus the read paths used by verification and reporting.
//!
//! ## Sequence Allocation
//!
//! ```text
//!   register(req)
//!       │
//!       ├── existing record by key id / installation id / fingerprint?
//!       │       └── yes: bump last_activity, return (sequence, created=false)
//!       │
//!       └── attempt 1..=3
//!               ├── sequence = max(sequence) + 1
//!               ├── insert(record, sequence)       (all-or-nothing)
//!               │     ├── Inserted        -> return (sequence, created=true)
//!               │     ├── SequenceTaken   -> recompute, next attempt
//!               │     └── IdentityTaken   -> a racing twin won: idempotent hit
//!               └── storage error         -> propagate, no retry
//!
//!       3 lost races -> SequenceExhausted
//! ```
//!
//! No global lock is taken: two registrations only interfere when they
//! compute the same sequence, and then exactly one of them commits. Because
//! every committed sequence was `max + 1` at the time it was read and the
//! loser never writes, the sequence space stays gap-free.

use crate::models::{
    DeviceRecord, DeviceRef, DeviceRegistration, InsertOutcome, Registration, RegistryError,
    Result,
};
use crate::storage::SledDeviceStore;
use crate::store::DeviceStore;
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};

/// Maximum insert attempts for one registration before giving up.
pub const SEQUENCE_ATTEMPTS: u32 = 3;

/// The device identity registry.
///
/// Generic over its [`DeviceStore`] so the allocation protocol can run
/// against any storage that enforces the unique constraints; the default is
/// the sled-backed store.
///
/// # Thread Safety
///
/// All operations take `&self`. Share a registry between threads with `Arc`
/// or by cloning the underlying store.
///
/// # Example
///
/// ```rust
/// use provenance_registry::{DeviceRegistration, DeviceRegistry};
///
/// let registry = DeviceRegistry::temporary().unwrap();
///
/// let request = DeviceRegistration {
///     installation_id: "install-1".to_string(),
///     device_model: "Pixel 8".to_string(),
///     os_name: "Android".to_string(),
///     os_version: "15".to_string(),
///     public_key_id: "k1".to_string(),
///     public_key_bytes: vec![0x02; 33],
///     public_key_fingerprint: "00aa11bb22cc33dd".to_string(),
///     device_fingerprint: "fp-1".to_string(),
/// };
///
/// let first = registry.register(&request).unwrap();
/// assert!(first.created);
/// assert_eq!(first.sequence, 1);
///
/// let again = registry.register(&request).unwrap();
/// assert!(!again.created);
/// assert_eq!(again.sequence, 1);
/// ```
pub struct DeviceRegistry<S: DeviceStore = SledDeviceStore> {
    store: S,
}

impl DeviceRegistry<SledDeviceStore> {
    /// Opens or creates a registry database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Database` if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::with_store(SledDeviceStore::open(path)?))
    }

    /// Creates an in-memory registry for testing.
    pub fn temporary() -> Result<Self> {
        Ok(Self::with_store(SledDeviceStore::temporary()?))
    }

    /// Uses the device trees of an already opened database.
    pub fn from_db(db: &sled::Db) -> Result<Self> {
        Ok(Self::with_store(SledDeviceStore::from_db(db)?))
    }
}

impl<S: DeviceStore> DeviceRegistry<S> {
    /// Wraps an arbitrary store.
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a device, or returns the existing record if any of its
    /// identities is already known.
    ///
    /// An existing match never errors and never creates a duplicate: it
    /// bumps `last_activity`, reactivates the record and returns its
    /// sequence with `created = false`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SequenceExhausted` if [`SEQUENCE_ATTEMPTS`] inserts
    ///   all lost a sequence race. The caller may retry the whole call.
    /// - `RegistryError::Database` / `Serialization` on storage faults,
    ///   which are never retried here.
    pub fn register(&self, registration: &DeviceRegistration) -> Result<Registration> {
        if let Some(existing) = self.reuse_existing(registration)? {
            return Ok(existing);
        }

        for attempt in 1..=SEQUENCE_ATTEMPTS {
            let sequence = self.store.max_sequence()?.unwrap_or(0) + 1;

            match self.store.insert(registration, sequence, Utc::now())? {
                InsertOutcome::Inserted(record) => {
                    info!(
                        public_key_id = %record.public_key_id,
                        sequence = record.sequence,
                        "device registered"
                    );
                    return Ok(Registration {
                        device_ref: record.device_ref,
                        sequence: record.sequence,
                        created: true,
                    });
                }
                InsertOutcome::SequenceTaken(taken) => {
                    warn!(
                        sequence = taken,
                        attempt,
                        max_attempts = SEQUENCE_ATTEMPTS,
                        "sequence conflict, recomputing"
                    );
                }
                InsertOutcome::IdentityTaken(field) => {
                    debug!(%field, "identity claimed by a concurrent registration");
                    return self.reuse_existing(registration)?.ok_or_else(|| {
                        RegistryError::Corrupt(format!(
                            "{} is indexed but no matching record exists",
                            field
                        ))
                    });
                }
            }
        }

        warn!(
            installation_id = %registration.installation_id,
            attempts = SEQUENCE_ATTEMPTS,
            "sequence allocation exhausted"
        );
        Err(RegistryError::SequenceExhausted {
            attempts: SEQUENCE_ATTEMPTS,
        })
    }

    /// Idempotent path: bump and return an existing record, if any.
    fn reuse_existing(&self, registration: &DeviceRegistration) -> Result<Option<Registration>> {
        let existing = match self.store.find_existing(
            &registration.public_key_id,
            &registration.installation_id,
            &registration.device_fingerprint,
        )? {
            Some(record) => record,
            None => return Ok(None),
        };

        let record = self
            .store
            .touch(existing.device_ref, Utc::now(), true)?
            .unwrap_or(existing);

        info!(
            public_key_id = %record.public_key_id,
            sequence = record.sequence,
            "device already registered, activity updated"
        );

        Ok(Some(Registration {
            device_ref: record.device_ref,
            sequence: record.sequence,
            created: false,
        }))
    }

    /// Looks up a device by public key id.
    pub fn lookup(&self, public_key_id: &str) -> Result<Option<DeviceRecord>> {
        self.store.by_public_key_id(public_key_id)
    }

    /// Looks up a device by installation id.
    pub fn lookup_installation(&self, installation_id: &str) -> Result<Option<DeviceRecord>> {
        self.store.by_installation_id(installation_id)
    }

    /// Loads a device by storage id.
    pub fn get(&self, device_ref: DeviceRef) -> Result<Option<DeviceRecord>> {
        self.store.get(device_ref)
    }

    /// All devices ordered by ascending sequence.
    pub fn list_all(&self) -> Result<Vec<DeviceRecord>> {
        self.store.list_by_sequence()
    }

    /// Bumps `last_activity` after a successful verification.
    ///
    /// Returns `false` if the device no longer exists.
    pub fn record_activity(&self, device_ref: DeviceRef) -> Result<bool> {
        Ok(self.store.touch(device_ref, Utc::now(), false)?.is_some())
    }

    /// Activates or deactivates a device. Records are never deleted.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for an unknown key id.
    pub fn set_active(&self, public_key_id: &str, active: bool) -> Result<DeviceRecord> {
        let record = self
            .store
            .by_public_key_id(public_key_id)?
            .ok_or_else(|| RegistryError::NotFound(public_key_id.to_string()))?;

        let updated = self
            .store
            .set_active(record.device_ref, active)?
            .ok_or_else(|| RegistryError::NotFound(public_key_id.to_string()))?;

        info!(public_key_id, active, "device activation changed");
        Ok(updated)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no devices are registered.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}

impl<S: DeviceStore> std::fmt::Debug for DeviceRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices_count", &self.len())
            .finish()
    }
}
