//! Access grants: pay once, view forever.
//!
//! A grant marker and the ledger mutation that paid for it commit in the same
//! write transaction. "Already paid" is read from the marker, so a retried or
//! concurrent request for the same (user, spot) never charges twice.

use crate::clock::Clock;
use crate::ledger::Ledger;
use crate::policy::access::{check_grantable, Viewer};
use crate::protocol::models::{AccessGrant, Identity};
use crate::store::records::{GrantRecord, PaymentMethod};
use crate::store::SpotStore;
use crate::SpotwardenError;
use heed::RwTxn;
use std::sync::Arc;

/// Decides and records access to spot unlock targets.
pub struct AccessGrants {
    store: Arc<SpotStore>,
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    moderator_id: u64,
}

impl AccessGrants {
    /// Create the grant service.
    pub fn new(
        store: Arc<SpotStore>,
        ledger: Arc<Ledger>,
        clock: Arc<dyn Clock>,
        moderator_id: u64,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            moderator_id,
        }
    }

    /// Grant `identity` access to a spot's unlock target.
    ///
    /// Free attempts are spent before balance. Authors never pay for their
    /// own spots.
    ///
    /// # Errors
    /// * `SpotNotFound` - no such spot
    /// * `SpotNotApproved` - not listed and the caller is not the author
    /// * `PaymentRequired` - no free attempt and balance below the price
    pub fn grant_access(
        &self,
        identity: &Identity,
        spot_id: u64,
    ) -> Result<AccessGrant, SpotwardenError> {
        let grant = self
            .store
            .write(|txn| self.grant_access_in(txn, identity, spot_id))?;

        if grant.replayed {
            tracing::debug!(user_id = identity.user_id, spot_id, "grant replayed");
        } else {
            tracing::info!(
                user_id = identity.user_id,
                spot_id,
                method = %grant.method,
                "access granted"
            );
        }
        Ok(grant)
    }

    fn grant_access_in(
        &self,
        txn: &mut RwTxn,
        identity: &Identity,
        spot_id: u64,
    ) -> Result<AccessGrant, SpotwardenError> {
        let spot = self
            .store
            .spot(txn, spot_id)?
            .ok_or(SpotwardenError::SpotNotFound { spot_id })?;

        let viewer = Viewer::classify(&spot, identity.user_id, self.moderator_id);
        check_grantable(&spot, viewer)?;

        if let Some(existing) = self.store.grant(txn, identity.user_id, spot_id)? {
            return Ok(AccessGrant {
                spot_id,
                unlock_target: spot.unlock_target,
                method: existing.method,
                replayed: true,
            });
        }

        self.ledger.ensure_user_in(txn, identity)?;

        let method = if viewer == Viewer::Author {
            PaymentMethod::Author
        } else {
            self.pay_in(txn, identity.user_id, spot.price)?
        };

        self.store.put_grant(
            txn,
            &GrantRecord {
                user_id: identity.user_id,
                spot_id,
                method,
                granted_at: self.clock.now_utc(),
            },
        )?;

        Ok(AccessGrant {
            spot_id,
            unlock_target: spot.unlock_target,
            method,
            replayed: false,
        })
    }

    fn pay_in(
        &self,
        txn: &mut RwTxn,
        user_id: u64,
        price: u64,
    ) -> Result<PaymentMethod, SpotwardenError> {
        match self.ledger.consume_free_attempt_in(txn, user_id) {
            Ok(_) => return Ok(PaymentMethod::FreeAttempt),
            Err(SpotwardenError::NoFreeAttempts) => {}
            Err(e) => return Err(e),
        }

        match self.ledger.debit_in(txn, user_id, price) {
            Ok(_) => Ok(PaymentMethod::Balance { amount: price }),
            Err(SpotwardenError::InsufficientFunds { .. }) => {
                Err(SpotwardenError::PaymentRequired { price })
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a grant exists for (user, spot).
    pub fn has_access(&self, user_id: u64, spot_id: u64) -> Result<bool, SpotwardenError> {
        self.store
            .read(|txn| Ok(self.store.grant(txn, user_id, spot_id)?.is_some()))
    }
}
