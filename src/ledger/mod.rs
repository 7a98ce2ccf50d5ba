//! User ledger: balances and free attempts.
//!
//! Every operation has two forms. The `*_in` form runs inside a caller's
//! write transaction so it can commit atomically with other writes (a grant
//! marker, a status change). The plain form opens and commits its own
//! transaction.

pub mod refill;

use crate::clock::Clock;
use crate::config::{FreeRefill, SpotwardenConfig};
use crate::protocol::models::Identity;
use crate::store::records::UserRecord;
use crate::store::SpotStore;
use crate::SpotwardenError;
use heed::RwTxn;
use std::sync::Arc;

/// Ledger economics taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct LedgerPolicy {
    /// Free attempts for a brand new user.
    pub starting_free_attempts: u32,
    /// Optional periodic grant.
    pub free_refill: Option<FreeRefill>,
}

impl From<&SpotwardenConfig> for LedgerPolicy {
    fn from(config: &SpotwardenConfig) -> Self {
        Self {
            starting_free_attempts: config.starting_free_attempts,
            free_refill: config.free_refill,
        }
    }
}

/// Atomic balance and free-attempt operations over the store.
pub struct Ledger {
    store: Arc<SpotStore>,
    clock: Arc<dyn Clock>,
    policy: LedgerPolicy,
}

impl Ledger {
    /// Create a ledger over a shared store.
    pub fn new(store: Arc<SpotStore>, clock: Arc<dyn Clock>, policy: LedgerPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    fn load(&self, txn: &mut RwTxn, user_id: u64) -> Result<UserRecord, SpotwardenError> {
        self.store
            .user(txn, user_id)?
            .ok_or(SpotwardenError::UserNotFound { user_id })
    }

    /// Create the user on first contact, or refresh display fields.
    ///
    /// Creation happens at most once per identity: the existence check and
    /// the insert share one write transaction.
    pub fn ensure_user_in(
        &self,
        txn: &mut RwTxn,
        identity: &Identity,
    ) -> Result<UserRecord, SpotwardenError> {
        let now = self.clock.now_utc();
        let (mut user, mut dirty) = match self.store.user(txn, identity.user_id)? {
            Some(user) => (user, false),
            None => {
                tracing::info!(
                    user_id = identity.user_id,
                    free_attempts = self.policy.starting_free_attempts,
                    "ledger account created"
                );
                (
                    UserRecord::new(identity.user_id, self.policy.starting_free_attempts, now),
                    true,
                )
            }
        };

        if identity.username.is_some() && user.username != identity.username {
            user.username = identity.username.clone();
            dirty = true;
        }
        if identity.first_name.is_some() && user.first_name != identity.first_name {
            user.first_name = identity.first_name.clone();
            dirty = true;
        }
        if let Some(policy) = &self.policy.free_refill {
            let before = user.last_free_refill;
            let added = refill::apply_refill(&mut user, policy, now);
            if added > 0 {
                tracing::info!(user_id = user.id, added, "free attempts refilled");
            }
            dirty |= before != user.last_free_refill;
        }

        if dirty {
            self.store.put_user(txn, &user)?;
        }
        Ok(user)
    }

    /// Debit `amount` if the balance covers it. Returns the new balance.
    pub fn debit_in(
        &self,
        txn: &mut RwTxn,
        user_id: u64,
        amount: u64,
    ) -> Result<u64, SpotwardenError> {
        let mut user = self.load(txn, user_id)?;
        if user.balance < amount {
            return Err(SpotwardenError::InsufficientFunds {
                balance: user.balance,
                required: amount,
            });
        }
        user.balance -= amount;
        self.store.put_user(txn, &user)?;
        Ok(user.balance)
    }

    /// Consume one free attempt. Returns the attempts left.
    pub fn consume_free_attempt_in(
        &self,
        txn: &mut RwTxn,
        user_id: u64,
    ) -> Result<u32, SpotwardenError> {
        let mut user = self.load(txn, user_id)?;
        if user.free_attempts == 0 {
            return Err(SpotwardenError::NoFreeAttempts);
        }
        user.free_attempts -= 1;
        self.store.put_user(txn, &user)?;
        Ok(user.free_attempts)
    }

    /// Credit `amount`, creating the account if needed. Returns the new balance.
    pub fn credit_in(
        &self,
        txn: &mut RwTxn,
        user_id: u64,
        amount: u64,
    ) -> Result<u64, SpotwardenError> {
        let mut user = match self.store.user(txn, user_id)? {
            Some(user) => user,
            None => UserRecord::new(
                user_id,
                self.policy.starting_free_attempts,
                self.clock.now_utc(),
            ),
        };
        user.balance = user
            .balance
            .checked_add(amount)
            .ok_or(SpotwardenError::LedgerOverflow { user_id })?;
        self.store.put_user(txn, &user)?;
        Ok(user.balance)
    }

    /// Explicitly grant free attempts. Returns the new attempt count.
    pub fn grant_free_attempts_in(
        &self,
        txn: &mut RwTxn,
        user_id: u64,
        attempts: u32,
    ) -> Result<u32, SpotwardenError> {
        let mut user = self.load(txn, user_id)?;
        user.free_attempts = user
            .free_attempts
            .checked_add(attempts)
            .ok_or(SpotwardenError::LedgerOverflow { user_id })?;
        self.store.put_user(txn, &user)?;
        Ok(user.free_attempts)
    }

    /// See [`Ledger::ensure_user_in`].
    pub fn ensure_user(&self, identity: &Identity) -> Result<UserRecord, SpotwardenError> {
        self.store.write(|txn| self.ensure_user_in(txn, identity))
    }

    /// See [`Ledger::debit_in`].
    pub fn debit(&self, user_id: u64, amount: u64) -> Result<u64, SpotwardenError> {
        self.store.write(|txn| self.debit_in(txn, user_id, amount))
    }

    /// See [`Ledger::consume_free_attempt_in`].
    pub fn consume_free_attempt(&self, user_id: u64) -> Result<u32, SpotwardenError> {
        self.store
            .write(|txn| self.consume_free_attempt_in(txn, user_id))
    }

    /// See [`Ledger::credit_in`].
    pub fn credit(&self, user_id: u64, amount: u64) -> Result<u64, SpotwardenError> {
        self.store.write(|txn| self.credit_in(txn, user_id, amount))
    }

    /// See [`Ledger::grant_free_attempts_in`].
    pub fn grant_free_attempts(&self, user_id: u64, attempts: u32) -> Result<u32, SpotwardenError> {
        self.store
            .write(|txn| self.grant_free_attempts_in(txn, user_id, attempts))
    }

    /// Current ledger row.
    pub fn account(&self, user_id: u64) -> Result<Option<UserRecord>, SpotwardenError> {
        self.store.read(|txn| self.store.user(txn, user_id))
    }
}
