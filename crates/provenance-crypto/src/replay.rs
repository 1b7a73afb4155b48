//! # Replay Guard
//!
//! Rejects claimed timestamps that lie too far from the verifier's clock.
//!
//! The window is symmetric: a timestamp 301 seconds in the past and one 301
//! seconds in the future are both refused under the default 300 second window.
//! Rejecting the future side stops a client from pre-dating a signature so it
//! stays "fresh" for longer than the window.
//!
//! The guard fails closed. A timestamp that cannot be parsed is a failure,
//! never a reason to skip the check.
//!
//! ## Accepted Formats
//!
//! | Format | Example | Interpretation |
//! |--------|---------|----------------|
//! | RFC 3339 | `2026-10-17T09:30:00Z`, `2026-10-17T11:30:00+02:00` | as written |
//! | ISO 8601 without offset | `2026-10-17T09:30:00.123` | UTC |

use crate::error::ReplayError;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Default tolerated skew between a claimed timestamp and now, in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 300;

/// Timestamp window check for signed payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayGuard {
    window_secs: u64,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

impl ReplayGuard {
    /// Creates a guard with the given window in seconds.
    pub fn new(window_secs: u64) -> Self {
        Self { window_secs }
    }

    /// Checks `claimed` against `now`. Returns the parsed timestamp on success.
    ///
    /// # Errors
    ///
    /// - `ReplayError::Unparsable` if `claimed` is not a recognised timestamp
    /// - `ReplayError::OutsideWindow` if `|now - claimed|` exceeds the window
    pub fn check(
        &self,
        claimed: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ReplayError> {
        check(claimed, now, self.window_secs)
    }
}

/// Checks a claimed timestamp against `now` within `window_secs`.
///
/// A skew of exactly `window_secs` is accepted.
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, SecondsFormat, Utc};
/// use provenance_crypto::replay::check;
///
/// let now = Utc::now();
/// let fresh = (now - Duration::seconds(299)).to_rfc3339_opts(SecondsFormat::Millis, true);
/// let stale = (now - Duration::seconds(301)).to_rfc3339_opts(SecondsFormat::Millis, true);
///
/// assert!(check(&fresh, now, 300).is_ok());
/// assert!(check(&stale, now, 300).is_err());
/// ```
pub fn check(
    claimed: &str,
    now: DateTime<Utc>,
    window_secs: u64,
) -> Result<DateTime<Utc>, ReplayError> {
    let timestamp = parse_timestamp(claimed)?;

    let skew_ms = (now - timestamp).num_milliseconds().unsigned_abs();
    let window_ms = window_secs.saturating_mul(1000);

    if skew_ms > window_ms {
        return Err(ReplayError::OutsideWindow {
            skew_secs: (now - timestamp).num_seconds().abs(),
            window_secs,
        });
    }

    Ok(timestamp)
}

/// Parses an RFC 3339 timestamp, or an offset-less ISO 8601 one as UTC.
///
/// # Errors
///
/// Returns `ReplayError::Unparsable` for anything else, including the empty
/// string.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ReplayError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ReplayError::Unparsable(raw.to_string()))
}
