//! # Provenance Audit Log
//!
//! Append-only record of verification attempts and the statistics derived
//! from it.
//!
//! ## Guarantees
//!
//! | Property | How |
//! |----------|-----|
//! | One entry per verification call | the engine appends before returning |
//! | Append-only | no update or delete API exists |
//! | Unknown keys are logged | `device_ref` is optional |
//! | `success_rate` is never NaN | defined as `0.0` when `total = 0` |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::Duration;
//! use provenance_audit::AuditLog;
//!
//! let log = AuditLog::open("./provenance.db").unwrap();
//! let stats = log.stats(Duration::hours(24)).unwrap();
//! println!("{}/{} verified", stats.valid, stats.total);
//!
//! for entry in log.recent(10).unwrap() {
//!     println!("#{} {} {}", entry.id, entry.attempt.public_key_id, entry.attempt.reason);
//! }
//! ```

pub mod error;
pub mod log;
pub mod models;

pub use error::{AuditError, Result};
pub use log::AuditLog;
pub use models::{success_rate, AttemptContext, AuditEntry, AuditStats, VerificationAttempt};
