//! Telegram Mini App `initData` verification.

pub mod freshness;
pub mod init_data;
pub mod pipeline;
pub mod signature;

pub use pipeline::{authenticate, AuthPolicy};
