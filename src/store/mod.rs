//! Persistent state: record formats and the LMDB store.

pub mod lmdb;
pub mod records;

pub use lmdb::SpotStore;
