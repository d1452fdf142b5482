//! Clock-skew policy for credentials.
//!
//! Our clock and GitHub's may disagree by up to [`CLOCK_SKEW`] in either
//! direction, both when we mint an assertion and when GitHub checks a token.

use chrono::{DateTime, TimeDelta, Utc};

/// Maximum assumed offset between our clock and GitHub's.
pub const CLOCK_SKEW: TimeDelta = TimeDelta::minutes(1);

/// Returns true if a credential expiring at `expires_at` may already be
/// expired from GitHub's point of view by the time it arrives.
pub fn is_too_close(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now + CLOCK_SKEW > expires_at
}
