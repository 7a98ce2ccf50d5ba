//! Spot moderation.
//!
//! One moderator, identified by Telegram id, moves spots out of Pending.
//! The status change and the author bonus share one write transaction, and
//! the status is re-read inside it, so a double tap on the same button
//! applies once and the second tap sees `AlreadyModerated`.

pub mod state;
pub mod token;

use crate::clock::Clock;
use crate::ledger::Ledger;
use crate::protocol::models::ModerationOutcome;
use crate::store::records::{SpotRecord, SpotStatus};
use crate::store::SpotStore;
use crate::SpotwardenError;
use state::{transition, ModerationAction};
use std::sync::Arc;

/// Moderator-only transitions over the spot store.
pub struct Moderation {
    store: Arc<SpotStore>,
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    moderator_id: u64,
    approval_bonus: u64,
}

impl Moderation {
    /// Create the moderation service.
    pub fn new(
        store: Arc<SpotStore>,
        ledger: Arc<Ledger>,
        clock: Arc<dyn Clock>,
        moderator_id: u64,
        approval_bonus: u64,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            moderator_id,
            approval_bonus,
        }
    }

    /// Whether `user_id` is the moderator.
    pub fn is_moderator(&self, user_id: u64) -> bool {
        user_id == self.moderator_id
    }

    /// Fail with `NotModerator` unless `actor_id` is the moderator.
    pub fn require_moderator(&self, actor_id: u64) -> Result<(), SpotwardenError> {
        if self.is_moderator(actor_id) {
            Ok(())
        } else {
            tracing::warn!(actor_id, "moderator action refused");
            Err(SpotwardenError::NotModerator)
        }
    }

    /// Approve a pending spot and credit its author.
    pub fn approve(
        &self,
        actor_id: u64,
        spot_id: u64,
    ) -> Result<(ModerationOutcome, SpotRecord), SpotwardenError> {
        self.apply(actor_id, spot_id, ModerationAction::Approve)
    }

    /// Reject a pending spot.
    pub fn reject(
        &self,
        actor_id: u64,
        spot_id: u64,
    ) -> Result<(ModerationOutcome, SpotRecord), SpotwardenError> {
        self.apply(actor_id, spot_id, ModerationAction::Reject)
    }

    /// Apply a moderator decision.
    ///
    /// Returns the outcome and the spot as committed.
    ///
    /// # Errors
    /// * `NotModerator` - actor is not the moderator
    /// * `SpotNotFound` - no such spot
    /// * `AlreadyModerated` - spot is not Pending
    /// * `LedgerOverflow` - bonus would overflow the author's balance
    pub fn apply(
        &self,
        actor_id: u64,
        spot_id: u64,
        action: ModerationAction,
    ) -> Result<(ModerationOutcome, SpotRecord), SpotwardenError> {
        self.require_moderator(actor_id)?;

        let (outcome, spot) = self.store.write(|txn| {
            let mut spot = self
                .store
                .spot(txn, spot_id)?
                .ok_or(SpotwardenError::SpotNotFound { spot_id })?;

            let next = transition(spot.status, action).ok_or(
                SpotwardenError::AlreadyModerated {
                    spot_id,
                    status: spot.status,
                },
            )?;
            spot.status = next;
            spot.moderated_at = Some(self.clock.now_utc());
            self.store.put_spot(txn, &spot)?;

            let mut outcome = ModerationOutcome {
                spot_id,
                author_id: spot.author_id,
                status: next,
                bonus_credited: None,
                author_balance: None,
            };
            if next == SpotStatus::Approved && self.approval_bonus > 0 {
                let balance = self
                    .ledger
                    .credit_in(txn, spot.author_id, self.approval_bonus)?;
                outcome.bonus_credited = Some(self.approval_bonus);
                outcome.author_balance = Some(balance);
            }
            Ok((outcome, spot))
        })?;

        tracing::info!(
            spot_id,
            author_id = outcome.author_id,
            status = %outcome.status,
            bonus = outcome.bonus_credited.unwrap_or(0),
            "spot moderated"
        );
        Ok((outcome, spot))
    }

    /// Show or hide an approved spot in the public listing.
    ///
    /// # Errors
    /// * `NotModerator` - actor is not the moderator
    /// * `SpotNotFound` - no such spot
    /// * `SpotNotApproved` - only approved spots carry a listing switch
    pub fn set_active(
        &self,
        actor_id: u64,
        spot_id: u64,
        active: bool,
    ) -> Result<SpotRecord, SpotwardenError> {
        self.require_moderator(actor_id)?;

        let spot = self.store.write(|txn| {
            let mut spot = self
                .store
                .spot(txn, spot_id)?
                .ok_or(SpotwardenError::SpotNotFound { spot_id })?;
            if spot.status != SpotStatus::Approved {
                return Err(SpotwardenError::SpotNotApproved { spot_id });
            }
            if spot.active != active {
                spot.active = active;
                self.store.put_spot(txn, &spot)?;
            }
            Ok(spot)
        })?;

        tracing::info!(spot_id, active, "spot listing switched");
        Ok(spot)
    }
}
