//! # Persistent Storage Layer
//!
//! Sled-backed implementation of [`DeviceStore`]. Records are serialized as
//! JSON; uniqueness is enforced with index trees that are written in the same
//! transaction as the record.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value | Purpose |
//! |------|-----|-------|---------|
//! | `devices` | device ref (u64 BE) | serialized DeviceRecord | Record storage |
//! | `device_sequences` | sequence (u64 BE) | device ref | Unique sequence, ordered listing |
//! | `device_installations` | installation id | device ref | Unique installation id |
//! | `device_keys` | public key id | device ref | Unique key id, verification lookup |
//! | `device_fingerprints` | device fingerprint | device ref | Duplicate detection |
//!
//! Big-endian integer keys make sled's lexicographic order equal to numeric
//! order, so the last key of `device_sequences` is the current maximum.
//!
//! ## Transactions
//!
//! An insert is a single sled transaction across all five trees. If any
//! unique index already holds the key, the transaction aborts and nothing is
//! written. Sled retries internal conflicts itself, so a racing insert either
//! commits entirely or observes the winner's index entries and aborts.
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>
//! - Sled transactions: <https://docs.rs/sled/0.34/sled/transaction/>

use crate::models::{
    DeviceRecord, DeviceRef, DeviceRegistration, IdentityField, InsertOutcome, RegistryError,
    Result,
};
use crate::store::DeviceStore;
use chrono::{DateTime, Utc};
use sled::transaction::{abort, TransactionError};
use sled::Transactional;
use std::path::Path;

/// Tree holding serialized records.
const DEVICE_TREE: &str = "devices";

/// Unique index: sequence -> device ref.
const SEQUENCE_TREE: &str = "device_sequences";

/// Unique index: installation id -> device ref.
const INSTALLATION_TREE: &str = "device_installations";

/// Unique index: public key id -> device ref.
const KEY_TREE: &str = "device_keys";

/// Duplicate-detection index: device fingerprint -> device ref.
const FINGERPRINT_TREE: &str = "device_fingerprints";

/// Why an insert transaction aborted.
#[derive(Debug, Clone, Copy)]
enum InsertConflict {
    Sequence,
    Identity(IdentityField),
}

/// Sled-backed device table.
///
/// # Thread Safety
///
/// Cloning is cheap and every clone shares the same trees. Multiple threads
/// can insert concurrently; sequence collisions surface as
/// [`InsertOutcome::SequenceTaken`].
///
/// # Example
///
/// ```rust
/// use provenance_registry::storage::SledDeviceStore;
/// use provenance_registry::DeviceStore;
///
/// let store = SledDeviceStore::temporary().unwrap();
/// assert!(store.is_empty());
/// assert_eq!(store.max_sequence().unwrap(), None);
/// ```
#[derive(Clone)]
pub struct SledDeviceStore {
    /// The underlying Sled database.
    db: sled::Db,

    devices: sled::Tree,
    sequences: sled::Tree,
    installations: sled::Tree,
    keys: sled::Tree,
    fingerprints: sled::Tree,
}

impl SledDeviceStore {
    /// Opens or creates a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Database` if the path is unusable, permissions
    /// are insufficient, or the database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Creates an in-memory store that is discarded on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db)
    }

    /// Opens the device trees inside an existing database, so the audit log
    /// can share the same file.
    pub fn from_db(db: &sled::Db) -> Result<Self> {
        Ok(SledDeviceStore {
            db: db.clone(),
            devices: db.open_tree(DEVICE_TREE)?,
            sequences: db.open_tree(SEQUENCE_TREE)?,
            installations: db.open_tree(INSTALLATION_TREE)?,
            keys: db.open_tree(KEY_TREE)?,
            fingerprints: db.open_tree(FINGERPRINT_TREE)?,
        })
    }

    fn decode_record(bytes: &[u8]) -> Result<DeviceRecord> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Follows an index entry to its record.
    fn resolve(&self, index: &sled::Tree, key: &[u8]) -> Result<Option<DeviceRecord>> {
        let device_ref = match index.get(key)? {
            Some(bytes) => DeviceRef::from_key(&bytes)
                .ok_or_else(|| RegistryError::Corrupt("malformed index entry".to_string()))?,
            None => return Ok(None),
        };

        match self.get(device_ref)? {
            Some(record) => Ok(Some(record)),
            None => Err(RegistryError::Corrupt(format!(
                "index points at missing device {}",
                device_ref
            ))),
        }
    }

    /// Read-modify-write of one record with compare-and-swap, retried until
    /// no concurrent writer intervenes.
    fn update<F>(&self, device_ref: DeviceRef, mutate: F) -> Result<Option<DeviceRecord>>
    where
        F: Fn(&mut DeviceRecord),
    {
        let key = device_ref.to_key();

        loop {
            let current = match self.devices.get(key)? {
                Some(bytes) => bytes,
                None => return Ok(None),
            };

            let mut record = Self::decode_record(&current)?;
            mutate(&mut record);
            let updated = serde_json::to_vec(&record)?;

            if self
                .devices
                .compare_and_swap(key, Some(current), Some(updated))?
                .is_ok()
            {
                return Ok(Some(record));
            }
        }
    }
}

impl DeviceStore for SledDeviceStore {
    fn find_existing(
        &self,
        public_key_id: &str,
        installation_id: &str,
        device_fingerprint: &str,
    ) -> Result<Option<DeviceRecord>> {
        if let Some(record) = self.resolve(&self.keys, public_key_id.as_bytes())? {
            return Ok(Some(record));
        }
        if let Some(record) = self.resolve(&self.installations, installation_id.as_bytes())? {
            return Ok(Some(record));
        }
        self.resolve(&self.fingerprints, device_fingerprint.as_bytes())
    }

    fn max_sequence(&self) -> Result<Option<u64>> {
        match self.sequences.last()? {
            Some((key, _)) => {
                let raw: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| RegistryError::Corrupt("malformed sequence key".to_string()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    fn insert(
        &self,
        registration: &DeviceRegistration,
        sequence: u64,
        at: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let device_ref = DeviceRef(self.db.generate_id()?);
        let record = DeviceRecord::new(device_ref, registration, sequence, at);
        let record_bytes = serde_json::to_vec(&record)?;
        let ref_key = device_ref.to_key();
        let sequence_key = sequence.to_be_bytes();

        let result = (
            &self.devices,
            &self.sequences,
            &self.installations,
            &self.keys,
            &self.fingerprints,
        )
            .transaction(|(devices, sequences, installations, keys, fingerprints)| {
                if sequences.get(&sequence_key[..])?.is_some() {
                    return abort(InsertConflict::Sequence);
                }
                if installations.get(record.installation_id.as_bytes())?.is_some() {
                    return abort(InsertConflict::Identity(IdentityField::InstallationId));
                }
                if keys.get(record.public_key_id.as_bytes())?.is_some() {
                    return abort(InsertConflict::Identity(IdentityField::PublicKeyId));
                }
                if fingerprints.get(record.device_fingerprint.as_bytes())?.is_some() {
                    return abort(InsertConflict::Identity(IdentityField::DeviceFingerprint));
                }

                devices.insert(&ref_key[..], record_bytes.as_slice())?;
                sequences.insert(&sequence_key[..], &ref_key[..])?;
                installations.insert(record.installation_id.as_bytes(), &ref_key[..])?;
                keys.insert(record.public_key_id.as_bytes(), &ref_key[..])?;
                fingerprints.insert(record.device_fingerprint.as_bytes(), &ref_key[..])?;
                Ok(())
            });

        match result {
            Ok(()) => Ok(InsertOutcome::Inserted(record)),
            Err(TransactionError::Abort(InsertConflict::Sequence)) => {
                Ok(InsertOutcome::SequenceTaken(sequence))
            }
            Err(TransactionError::Abort(InsertConflict::Identity(field))) => {
                Ok(InsertOutcome::IdentityTaken(field))
            }
            Err(TransactionError::Storage(e)) => Err(RegistryError::Database(e)),
        }
    }

    fn get(&self, device_ref: DeviceRef) -> Result<Option<DeviceRecord>> {
        match self.devices.get(device_ref.to_key())? {
            Some(bytes) => Ok(Some(Self::decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn by_public_key_id(&self, public_key_id: &str) -> Result<Option<DeviceRecord>> {
        self.resolve(&self.keys, public_key_id.as_bytes())
    }

    fn by_installation_id(&self, installation_id: &str) -> Result<Option<DeviceRecord>> {
        self.resolve(&self.installations, installation_id.as_bytes())
    }

    fn touch(
        &self,
        device_ref: DeviceRef,
        at: DateTime<Utc>,
        reactivate: bool,
    ) -> Result<Option<DeviceRecord>> {
        self.update(device_ref, |record| {
            record.last_activity = at;
            if reactivate {
                record.is_active = true;
            }
        })
    }

    fn set_active(&self, device_ref: DeviceRef, active: bool) -> Result<Option<DeviceRecord>> {
        self.update(device_ref, |record| record.is_active = active)
    }

    fn list_by_sequence(&self) -> Result<Vec<DeviceRecord>> {
        let mut records = Vec::with_capacity(self.sequences.len());

        for entry in self.sequences.iter() {
            let (_, ref_bytes) = entry?;
            let device_ref = DeviceRef::from_key(&ref_bytes)
                .ok_or_else(|| RegistryError::Corrupt("malformed sequence entry".to_string()))?;
            let record = self.get(device_ref)?.ok_or_else(|| {
                RegistryError::Corrupt(format!("sequence points at missing device {}", device_ref))
            })?;
            records.push(record);
        }

        Ok(records)
    }

    fn len(&self) -> usize {
        self.devices.len()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for SledDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledDeviceStore")
            .field("devices_count", &self.len())
            .finish()
    }
}
