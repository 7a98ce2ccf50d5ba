//! Wire-facing data types.

pub mod models;
