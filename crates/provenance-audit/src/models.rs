//! Attempt records and aggregate statistics.

use chrono::{DateTime, Utc};
use provenance_registry::DeviceRef;
use serde::{Deserialize, Serialize};

/// Decimal places kept in [`AuditStats::success_rate`].
pub const SUCCESS_RATE_PRECISION: i32 = 4;

/// Where a verification request came from. Both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptContext {
    /// Remote address as reported by the transport layer.
    pub client_addr: Option<String>,

    /// Client user agent string.
    pub user_agent: Option<String>,
}

impl AttemptContext {
    /// Context with a client address.
    pub fn from_addr(addr: impl Into<String>) -> Self {
        Self {
            client_addr: Some(addr.into()),
            user_agent: None,
        }
    }

    /// Adds a user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// One logged verification call, whatever its outcome.
///
/// `device_ref` is `None` when the key id did not resolve to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAttempt {
    /// The device the key id resolved to, if any.
    pub device_ref: Option<DeviceRef>,

    /// Key id exactly as supplied by the caller.
    pub public_key_id: String,

    /// Digest of the verified payload, as supplied.
    pub content_digest: String,

    /// Final outcome.
    pub verdict: bool,

    /// Short reason code, `"ok"` on success.
    pub reason: String,

    /// The submitted signature, kept for audit replay.
    pub raw_signature: Option<String>,

    /// Request origin.
    #[serde(flatten)]
    pub context: AttemptContext,

    /// When the attempt was logged.
    pub timestamp: DateTime<Utc>,
}

/// A stored attempt together with its log position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic id; later appends have larger ids.
    pub id: u64,

    /// The attempt.
    pub attempt: VerificationAttempt,
}

/// Aggregate over all logged attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    /// All attempts.
    pub total: u64,

    /// Attempts that verified.
    pub valid: u64,

    /// Attempts that did not verify.
    pub invalid: u64,

    /// `valid / total`, rounded; `0.0` when nothing was logged.
    pub success_rate: f64,

    /// Attempts logged inside the recent window.
    pub recent: u64,
}

impl AuditStats {
    /// Builds stats from raw counts.
    pub fn from_counts(total: u64, valid: u64, recent: u64) -> Self {
        Self {
            total,
            valid,
            invalid: total.saturating_sub(valid),
            success_rate: success_rate(valid, total),
            recent,
        }
    }
}

impl Default for AuditStats {
    fn default() -> Self {
        Self::from_counts(0, 0, 0)
    }
}

/// `valid / total` rounded to [`SUCCESS_RATE_PRECISION`] places.
pub fn success_rate(valid: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scale = 10f64.powi(SUCCESS_RATE_PRECISION);
    ((valid as f64 / total as f64) * scale).round() / scale
}
