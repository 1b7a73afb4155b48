//! # Append-Only Verification Log
//!
//! Every verification call appends exactly one [`VerificationAttempt`].
//! Entries are never updated, compacted or deleted by this crate.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `verification_attempts` | attempt id (u64 BE) | serialized attempt |
//!
//! Attempt ids come from sled's `generate_id`, which is monotonic per
//! database, so key order is append order and the newest entries sit at the
//! end of the tree.

use crate::error::{AuditError, Result};
use crate::models::{AuditEntry, AuditStats, VerificationAttempt};
use chrono::{DateTime, Duration, Utc};
use provenance_registry::DeviceRef;
use std::path::Path;
use tracing::debug;

/// Tree holding serialized attempts.
const ATTEMPT_TREE: &str = "verification_attempts";

/// Sled-backed audit log.
///
/// Cloning shares the same tree, so one log can be handed to many
/// concurrent verifiers.
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use provenance_audit::{AttemptContext, AuditLog, VerificationAttempt};
///
/// let log = AuditLog::temporary().unwrap();
/// log.append(&VerificationAttempt {
///     device_ref: None,
///     public_key_id: "unknown".to_string(),
///     content_digest: "0".repeat(128),
///     verdict: false,
///     reason: "key_not_found".to_string(),
///     raw_signature: None,
///     context: AttemptContext::default(),
///     timestamp: Utc::now(),
/// }).unwrap();
///
/// let stats = log.stats(Duration::hours(24)).unwrap();
/// assert_eq!((stats.total, stats.invalid), (1, 1));
/// ```
#[derive(Clone)]
pub struct AuditLog {
    db: sled::Db,
    attempts: sled::Tree,
}

impl AuditLog {
    /// Opens or creates a log at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Creates an in-memory log for testing.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db)
    }

    /// Opens the attempt tree inside an existing database.
    pub fn from_db(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            db: db.clone(),
            attempts: db.open_tree(ATTEMPT_TREE)?,
        })
    }

    /// Appends an attempt and returns its id.
    ///
    /// # Errors
    ///
    /// Storage faults are returned as-is; the caller decides whether the
    /// surrounding operation still counts as completed.
    pub fn append(&self, attempt: &VerificationAttempt) -> Result<u64> {
        let id = self.db.generate_id()?;
        let bytes = serde_json::to_vec(attempt)?;
        self.attempts.insert(id.to_be_bytes(), bytes)?;

        debug!(
            id,
            public_key_id = %attempt.public_key_id,
            verdict = attempt.verdict,
            reason = %attempt.reason,
            "verification attempt logged"
        );
        Ok(id)
    }

    /// Aggregates all attempts; `recent` counts those logged within
    /// `recent_window` of now.
    pub fn stats(&self, recent_window: Duration) -> Result<AuditStats> {
        self.stats_at(Utc::now(), recent_window)
    }

    /// Like [`AuditLog::stats`] with an explicit reference time.
    ///
    /// # Errors
    ///
    /// `AuditError::InvalidWindow` if the window is negative or `now - window`
    /// falls outside the calendar range.
    pub fn stats_at(&self, now: DateTime<Utc>, recent_window: Duration) -> Result<AuditStats> {
        if recent_window < Duration::zero() {
            return Err(AuditError::InvalidWindow(format!("negative window {}", recent_window)));
        }
        let cutoff = now
            .checked_sub_signed(recent_window)
            .ok_or_else(|| AuditError::InvalidWindow(format!("window {}", recent_window)))?;
        let (mut total, mut valid, mut recent) = (0u64, 0u64, 0u64);

        for item in self.attempts.iter() {
            let (_, value) = item?;
            let attempt: VerificationAttempt = serde_json::from_slice(&value)?;
            total += 1;
            if attempt.verdict {
                valid += 1;
            }
            if attempt.timestamp >= cutoff {
                recent += 1;
            }
        }

        Ok(AuditStats::from_counts(total, valid, recent))
    }

    /// The newest `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.attempts
            .iter()
            .rev()
            .take(limit)
            .map(|item| {
                let (key, value) = item?;
                Self::decode_entry(&key, &value)
            })
            .collect()
    }

    /// All entries that resolved to `device_ref`, oldest first.
    pub fn for_device(&self, device_ref: DeviceRef) -> Result<Vec<AuditEntry>> {
        let mut entries = Vec::new();
        for item in self.attempts.iter() {
            let (key, value) = item?;
            let entry = Self::decode_entry(&key, &value)?;
            if entry.attempt.device_ref == Some(device_ref) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Number of logged attempts.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Returns true if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.attempts.flush()?;
        Ok(())
    }

    fn decode_entry(key: &[u8], value: &[u8]) -> Result<AuditEntry> {
        let raw: [u8; 8] = key
            .try_into()
            .map_err(|_| AuditError::Corrupt(format!("attempt key of {} bytes", key.len())))?;
        Ok(AuditEntry {
            id: u64::from_be_bytes(raw),
            attempt: serde_json::from_slice(value)?,
        })
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("attempts_count", &self.attempts.len())
            .finish()
    }
}
