//! The storage port the registry runs against.
//!
//! The registry never assumes that "compute the next sequence" and "insert
//! the record" form one atomic step. A store only has to guarantee that an
//! insert is all-or-nothing and that it refuses a sequence or identity that is
//! already present. [`crate::DeviceRegistry`] turns that into a correct
//! allocator with bounded optimistic retry.

use crate::models::{DeviceRecord, DeviceRef, DeviceRegistration, InsertOutcome, Result};
use chrono::{DateTime, Utc};

/// Durable device table with unique `installation_id`, `public_key_id`
/// and `sequence`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Concurrent callers may race on
/// the same sequence; the loser must see [`InsertOutcome::SequenceTaken`].
pub trait DeviceStore: Send + Sync {
    /// Finds a record matching any of the three identities, checked in the
    /// order `public_key_id`, `installation_id`, `device_fingerprint`.
    fn find_existing(
        &self,
        public_key_id: &str,
        installation_id: &str,
        device_fingerprint: &str,
    ) -> Result<Option<DeviceRecord>>;

    /// Highest sequence currently stored, if any.
    fn max_sequence(&self) -> Result<Option<u64>>;

    /// Inserts a new record with `sequence`, atomically with its indexes.
    fn insert(
        &self,
        registration: &DeviceRegistration,
        sequence: u64,
        at: DateTime<Utc>,
    ) -> Result<InsertOutcome>;

    /// Loads a record by its storage id.
    fn get(&self, device_ref: DeviceRef) -> Result<Option<DeviceRecord>>;

    /// Loads a record by public key id.
    fn by_public_key_id(&self, public_key_id: &str) -> Result<Option<DeviceRecord>>;

    /// Loads a record by installation id.
    fn by_installation_id(&self, installation_id: &str) -> Result<Option<DeviceRecord>>;

    /// Sets `last_activity`, and `is_active = true` when `reactivate` is set.
    /// Returns the updated record, or `None` if it does not exist.
    fn touch(
        &self,
        device_ref: DeviceRef,
        at: DateTime<Utc>,
        reactivate: bool,
    ) -> Result<Option<DeviceRecord>>;

    /// Sets `is_active`. Returns the updated record, or `None`.
    fn set_active(&self, device_ref: DeviceRef, active: bool) -> Result<Option<DeviceRecord>>;

    /// All records ordered by ascending sequence.
    fn list_by_sequence(&self) -> Result<Vec<DeviceRecord>>;

    /// Number of stored records.
    fn len(&self) -> usize;

    /// Returns true if the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persists pending writes.
    fn flush(&self) -> Result<()>;
}
