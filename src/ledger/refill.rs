//! Periodic free-attempt grants with clock-driven rollover.

use crate::config::FreeRefill;
use crate::store::records::UserRecord;
use chrono::{DateTime, Utc};

/// Apply a due refill to a user record.
///
/// A user with no recorded refill starts a new period at `now` without
/// receiving attempts; the starting allowance already covers the first one.
/// Returns the number of attempts added.
pub fn apply_refill(user: &mut UserRecord, policy: &FreeRefill, now: DateTime<Utc>) -> u32 {
    let Some(last) = user.last_free_refill else {
        user.last_free_refill = Some(now);
        return 0;
    };

    let elapsed = match (now - last).to_std() {
        Ok(elapsed) => elapsed,
        // Clock went backwards; wait for it to catch up.
        Err(_) => return 0,
    };
    if elapsed < policy.interval {
        return 0;
    }

    user.free_attempts = user.free_attempts.saturating_add(policy.amount);
    user.last_free_refill = Some(now);
    policy.amount
}
