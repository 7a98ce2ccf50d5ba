//! `auth_date` freshness enforcement (replay prevention).

use crate::clock::Clock;
use crate::SpotwardenError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Maximum future tolerance for `auth_date` (60 seconds).
pub const MAX_FUTURE_TOLERANCE_SECONDS: i64 = 60;

/// Check that a payload was signed recently enough.
///
/// # Arguments
/// * `auth_date` - Signing time embedded in the payload
/// * `max_age` - Oldest acceptable payload; `None` skips the age check
/// * `clock` - Clock implementation for current time
///
/// # Errors
/// * `InvalidSignature` - payload is older than `max_age`, or dated more
///   than 60s in the future
pub fn check_freshness<C: Clock + ?Sized>(
    auth_date: DateTime<Utc>,
    max_age: Option<Duration>,
    clock: &C,
) -> Result<(), SpotwardenError> {
    let age_seconds = (clock.now_utc() - auth_date).num_seconds();

    if age_seconds < -MAX_FUTURE_TOLERANCE_SECONDS {
        tracing::warn!(age_seconds, "initData dated in the future");
        return Err(SpotwardenError::InvalidSignature);
    }

    if let Some(max_age) = max_age {
        let limit = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        if age_seconds > limit {
            tracing::debug!(age_seconds, limit, "initData expired");
            return Err(SpotwardenError::InvalidSignature);
        }
    }

    Ok(())
}
