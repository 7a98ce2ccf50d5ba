//! Spot visibility rules.
//!
//! This module decides who may unlock what:
//! - Approved, active spots are open to everyone (subject to payment)
//! - Pending, rejected or deactivated spots are open only to their author

use crate::store::records::SpotRecord;
use crate::SpotwardenError;

/// Who is looking at a spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// The spot's author.
    Author,
    /// The moderator.
    Moderator,
    /// Anyone else.
    Public,
}

impl Viewer {
    /// Classify `user_id` relative to a spot.
    pub fn classify(spot: &SpotRecord, user_id: u64, moderator_id: u64) -> Self {
        if spot.author_id == user_id {
            Viewer::Author
        } else if user_id == moderator_id {
            Viewer::Moderator
        } else {
            Viewer::Public
        }
    }
}

/// Check that a buyer may start a grant on this spot.
///
/// Authors bypass the status gate. Everyone else, moderator included,
/// buys only listed spots.
///
/// # Errors
/// * `SpotNotApproved` - the spot is not Approved, or is deactivated
pub fn check_grantable(spot: &SpotRecord, viewer: Viewer) -> Result<(), SpotwardenError> {
    if viewer == Viewer::Author || spot.is_listed() {
        return Ok(());
    }
    Err(SpotwardenError::SpotNotApproved { spot_id: spot.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::SpotStatus;
    use chrono::DateTime;

    fn spot(status: SpotStatus, active: bool) -> SpotRecord {
        SpotRecord {
            id: 3,
            title: "Old factory".into(),
            lat: 56.3,
            lon: 43.9,
            unlock_target: "https://telegra.ph/factory".into(),
            author_id: 10,
            author_handle: "@author".into(),
            danger: None,
            price: 20,
            status,
            active,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            moderated_at: None,
        }
    }

    #[test]
    fn test_classify() {
        let s = spot(SpotStatus::Pending, true);
        assert_eq!(Viewer::classify(&s, 10, 99), Viewer::Author);
        assert_eq!(Viewer::classify(&s, 99, 99), Viewer::Moderator);
        assert_eq!(Viewer::classify(&s, 11, 99), Viewer::Public);
    }

    #[test]
    fn test_author_is_moderator_classifies_as_author() {
        let s = spot(SpotStatus::Pending, true);
        assert_eq!(Viewer::classify(&s, 10, 10), Viewer::Author);
    }

    #[test]
    fn test_public_may_buy_approved() {
        assert!(check_grantable(&spot(SpotStatus::Approved, true), Viewer::Public).is_ok());
    }

    #[test]
    fn test_public_blocked_on_pending_and_rejected() {
        for status in [SpotStatus::Pending, SpotStatus::Rejected] {
            let result = check_grantable(&spot(status, true), Viewer::Public);
            assert!(matches!(
                result,
                Err(SpotwardenError::SpotNotApproved { spot_id: 3 })
            ));
        }
    }

    #[test]
    fn test_deactivated_spot_not_grantable() {
        let result = check_grantable(&spot(SpotStatus::Approved, false), Viewer::Public);
        assert!(matches!(result, Err(SpotwardenError::SpotNotApproved { .. })));
    }

    #[test]
    fn test_author_bypasses_status() {
        assert!(check_grantable(&spot(SpotStatus::Pending, true), Viewer::Author).is_ok());
        assert!(check_grantable(&spot(SpotStatus::Rejected, false), Viewer::Author).is_ok());
    }

    #[test]
    fn test_moderator_buys_like_public() {
        assert!(check_grantable(&spot(SpotStatus::Pending, true), Viewer::Moderator).is_err());
    }
}
