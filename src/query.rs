//! Read-only projections.
//!
//! All queries run on a single read snapshot and never block writers.

use crate::protocol::models::{Profile, SpotDetail, SpotSummary};
use crate::store::records::SpotStatus;
use crate::store::SpotStore;
use crate::SpotwardenError;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Query surface over the spot store.
pub struct SpotQueries {
    store: Arc<SpotStore>,
    moderator_id: u64,
}

impl SpotQueries {
    /// Create the query surface.
    pub fn new(store: Arc<SpotStore>, moderator_id: u64) -> Self {
        Self {
            store,
            moderator_id,
        }
    }

    /// Approved, active spots in id order. Unlock targets are never included.
    pub fn list_approved_spots(&self) -> Result<Vec<SpotSummary>, SpotwardenError> {
        let spots = self
            .store
            .read(|txn| self.store.spots_where(txn, |s| s.is_listed()))?;
        Ok(spots.iter().map(SpotSummary::from).collect())
    }

    /// Ledger position and ownership of a user.
    ///
    /// # Errors
    /// * `UserNotFound` - the user never authenticated
    pub fn get_profile(&self, user_id: u64) -> Result<Profile, SpotwardenError> {
        self.store.read(|txn| {
            let user = self
                .store
                .user(txn, user_id)?
                .ok_or(SpotwardenError::UserNotFound { user_id })?;
            let unlocked_spot_ids: BTreeSet<u64> = self
                .store
                .grants_for_user(txn, user_id)?
                .into_iter()
                .map(|g| g.spot_id)
                .collect();

            Ok(Profile {
                user_id: user.id,
                balance: user.balance,
                free_attempts: user.free_attempts,
                username: user.username,
                first_name: user.first_name,
                owned_spot_ids: user.owned_spot_ids,
                unlocked_spot_ids,
            })
        })
    }

    /// Every spot the user authored, in any status.
    pub fn own_spots(&self, user_id: u64) -> Result<Vec<SpotDetail>, SpotwardenError> {
        let spots = self
            .store
            .read(|txn| self.store.spots_where(txn, |s| s.author_id == user_id))?;
        Ok(spots.iter().map(SpotDetail::from).collect())
    }

    /// Spots awaiting moderation. Moderator only.
    pub fn pending_spots(&self, actor_id: u64) -> Result<Vec<SpotDetail>, SpotwardenError> {
        if actor_id != self.moderator_id {
            return Err(SpotwardenError::NotModerator);
        }
        let spots = self.store.read(|txn| {
            self.store
                .spots_where(txn, |s| s.status == SpotStatus::Pending)
        })?;
        Ok(spots.iter().map(SpotDetail::from).collect())
    }
}
