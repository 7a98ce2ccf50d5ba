//! LMDB-backed record store.
//!
//! One environment holds five named databases:
//! - `users`:  u64 (BE) → JSON [`UserRecord`]
//! - `spots`:  u64 (BE) → JSON [`SpotRecord`]
//! - `grants`: `"<user>:<spot>"` → JSON [`GrantRecord`]
//! - `outbox`: u64 (BE) → JSON [`OutboxEntry`]
//! - `meta`:   counter name → u64 (BE)
//!
//! LMDB admits one write transaction at a time. Every mutating operation in
//! the crate runs through [`SpotStore::write`], so a read-check-write inside
//! the closure cannot interleave with another writer, and an `Err` from the
//! closure aborts the transaction without touching the data.

use crate::store::records::{GrantRecord, OutboxEntry, SpotRecord, UserRecord};
use crate::SpotwardenError;
use heed::byteorder::BigEndian;
use heed::types::{SerdeJson, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use std::fs;
use std::path::{Path, PathBuf};

type BEU64 = U64<BigEndian>;

const MAX_DB_SIZE: usize = 256 * 1024 * 1024;
const NEXT_SPOT_ID: &str = "next_spot_id";
const NEXT_OUTBOX_ID: &str = "next_outbox_id";

fn store_io(context: &'static str) -> impl Fn(heed::Error) -> SpotwardenError {
    move |e| SpotwardenError::StoreIO(format!("{}: {}", context, e))
}

/// Transactional store for users, spots, grants and pending notices.
pub struct SpotStore {
    env: Env,
    path: PathBuf,
    users: Database<BEU64, SerdeJson<UserRecord>>,
    spots: Database<BEU64, SerdeJson<SpotRecord>>,
    grants: Database<Str, SerdeJson<GrantRecord>>,
    outbox: Database<BEU64, SerdeJson<OutboxEntry>>,
    meta: Database<Str, BEU64>,
}

impl SpotStore {
    /// Open or create the store at the given directory.
    pub fn open(path: &Path) -> Result<Self, SpotwardenError> {
        fs::create_dir_all(path)
            .map_err(|e| SpotwardenError::StoreIO(format!("Failed to create store dir: {}", e)))?;

        // SAFETY: the environment is opened once per directory by this
        // process and is not memory-mapped by anything else we control.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAX_DB_SIZE)
                .max_dbs(8)
                .open(path)
                .map_err(store_io("open environment"))?
        };

        let mut wtxn = env.write_txn().map_err(store_io("begin setup"))?;
        let users = env
            .create_database(&mut wtxn, Some("users"))
            .map_err(store_io("create users"))?;
        let spots = env
            .create_database(&mut wtxn, Some("spots"))
            .map_err(store_io("create spots"))?;
        let grants = env
            .create_database(&mut wtxn, Some("grants"))
            .map_err(store_io("create grants"))?;
        let outbox = env
            .create_database(&mut wtxn, Some("outbox"))
            .map_err(store_io("create outbox"))?;
        let meta = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(store_io("create meta"))?;
        wtxn.commit().map_err(store_io("commit setup"))?;

        tracing::info!(path = %path.display(), "spot store opened");
        Ok(Self {
            env,
            path: path.to_path_buf(),
            users,
            spots,
            grants,
            outbox,
            meta,
        })
    }

    /// Directory of the environment.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a write transaction, committing only if it succeeds.
    pub fn write<T, F>(&self, f: F) -> Result<T, SpotwardenError>
    where
        F: FnOnce(&mut RwTxn) -> Result<T, SpotwardenError>,
    {
        let mut wtxn = self.env.write_txn().map_err(store_io("begin write"))?;
        let value = f(&mut wtxn)?;
        wtxn.commit().map_err(store_io("commit"))?;
        Ok(value)
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T, F>(&self, f: F) -> Result<T, SpotwardenError>
    where
        F: FnOnce(&RoTxn) -> Result<T, SpotwardenError>,
    {
        let rtxn = self.env.read_txn().map_err(store_io("begin read"))?;
        f(&rtxn)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Load a user.
    pub fn user(&self, txn: &RoTxn, id: u64) -> Result<Option<UserRecord>, SpotwardenError> {
        self.users.get(txn, &id).map_err(store_io("read user"))
    }

    /// Insert or replace a user.
    pub fn put_user(&self, txn: &mut RwTxn, user: &UserRecord) -> Result<(), SpotwardenError> {
        self.users
            .put(txn, &user.id, user)
            .map_err(store_io("write user"))
    }

    // ------------------------------------------------------------------
    // Spots
    // ------------------------------------------------------------------

    /// Load a spot.
    pub fn spot(&self, txn: &RoTxn, id: u64) -> Result<Option<SpotRecord>, SpotwardenError> {
        self.spots.get(txn, &id).map_err(store_io("read spot"))
    }

    /// Insert or replace a spot.
    pub fn put_spot(&self, txn: &mut RwTxn, spot: &SpotRecord) -> Result<(), SpotwardenError> {
        self.spots
            .put(txn, &spot.id, spot)
            .map_err(store_io("write spot"))
    }

    /// All spots matching `filter`, in id order.
    pub fn spots_where<F>(&self, txn: &RoTxn, filter: F) -> Result<Vec<SpotRecord>, SpotwardenError>
    where
        F: Fn(&SpotRecord) -> bool,
    {
        let mut out = Vec::new();
        for entry in self.spots.iter(txn).map_err(store_io("iterate spots"))? {
            let (_, spot) = entry.map_err(store_io("read spot"))?;
            if filter(&spot) {
                out.push(spot);
            }
        }
        Ok(out)
    }

    /// Allocate the next spot id.
    pub fn next_spot_id(&self, txn: &mut RwTxn) -> Result<u64, SpotwardenError> {
        self.next_counter(txn, NEXT_SPOT_ID)
    }

    // ------------------------------------------------------------------
    // Grants
    // ------------------------------------------------------------------

    /// Load the grant for (user, spot).
    pub fn grant(
        &self,
        txn: &RoTxn,
        user_id: u64,
        spot_id: u64,
    ) -> Result<Option<GrantRecord>, SpotwardenError> {
        self.grants
            .get(txn, &GrantRecord::key(user_id, spot_id))
            .map_err(store_io("read grant"))
    }

    /// Record a grant.
    pub fn put_grant(&self, txn: &mut RwTxn, grant: &GrantRecord) -> Result<(), SpotwardenError> {
        self.grants
            .put(txn, &GrantRecord::key(grant.user_id, grant.spot_id), grant)
            .map_err(store_io("write grant"))
    }

    /// All grants held by a user.
    pub fn grants_for_user(
        &self,
        txn: &RoTxn,
        user_id: u64,
    ) -> Result<Vec<GrantRecord>, SpotwardenError> {
        let mut out = Vec::new();
        for entry in self.grants.iter(txn).map_err(store_io("iterate grants"))? {
            let (_, grant) = entry.map_err(store_io("read grant"))?;
            if grant.user_id == user_id {
                out.push(grant);
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Outbox
    // ------------------------------------------------------------------

    /// Append a pending notice, assigning its id.
    pub fn push_outbox(
        &self,
        txn: &mut RwTxn,
        mut entry: OutboxEntry,
    ) -> Result<u64, SpotwardenError> {
        entry.id = self.next_counter(txn, NEXT_OUTBOX_ID)?;
        self.outbox
            .put(txn, &entry.id, &entry)
            .map_err(store_io("write outbox"))?;
        Ok(entry.id)
    }

    /// Replace a pending notice (attempt bookkeeping).
    pub fn update_outbox(&self, txn: &mut RwTxn, entry: &OutboxEntry) -> Result<(), SpotwardenError> {
        self.outbox
            .put(txn, &entry.id, entry)
            .map_err(store_io("write outbox"))
    }

    /// A single pending notice.
    pub fn outbox_entry(&self, txn: &RoTxn, id: u64) -> Result<Option<OutboxEntry>, SpotwardenError> {
        self.outbox.get(txn, &id).map_err(store_io("read outbox"))
    }

    /// Remove a delivered notice.
    pub fn remove_outbox(&self, txn: &mut RwTxn, id: u64) -> Result<bool, SpotwardenError> {
        self.outbox
            .delete(txn, &id)
            .map_err(store_io("delete outbox"))
    }

    /// Pending notices, oldest first.
    pub fn outbox_entries(&self, txn: &RoTxn) -> Result<Vec<OutboxEntry>, SpotwardenError> {
        let mut out = Vec::new();
        for entry in self.outbox.iter(txn).map_err(store_io("iterate outbox"))? {
            let (_, item) = entry.map_err(store_io("read outbox"))?;
            out.push(item);
        }
        Ok(out)
    }

    fn next_counter(&self, txn: &mut RwTxn, name: &str) -> Result<u64, SpotwardenError> {
        let current = self
            .meta
            .get(txn, name)
            .map_err(store_io("read counter"))?
            .unwrap_or(0);
        let next = current + 1;
        self.meta
            .put(txn, name, &next)
            .map_err(store_io("write counter"))?;
        Ok(next)
    }
}
