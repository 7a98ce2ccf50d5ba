//! # Spotwarden
//!
//! **Access control and ledger core for a Telegram Mini App that sells
//! unlocks of map spots.**
//!
//! Users browse geographic spots, spend a free attempt or a small fee to
//! unlock a spot's tutorial link, and submit new spots that a moderator
//! approves or rejects.
//!
//! ## Features
//!
//! - **`initData` verification**: HMAC-SHA256 over the Telegram data-check
//!   string, constant-time comparison, 24-hour freshness window
//! - **Pay once**: the grant marker and the debit commit in one LMDB write
//!   transaction, so retries and concurrent taps never charge twice
//! - **Free attempts first**: currency is touched only when no free attempt
//!   is left
//! - **Moderation state machine**: Pending to Approved or Rejected, once,
//!   with the author bonus credited atomically
//! - **Signed moderator buttons**: callback data carries a truncated HMAC so
//!   only tokens minted by this service are accepted
//! - **Best-effort notices**: transient Bot API failures are queued and
//!   retried a bounded number of times, never fatal
//!
//! ## Quickstart
//!
//! ```no_run
//! use spotwarden::{SpotService, SpotwardenConfig};
//!
//! fn main() -> Result<(), spotwarden::SpotwardenError> {
//!     let config = SpotwardenConfig::from_env()?;
//!     let service = SpotService::new(config)?;
//!
//!     let init_data = "query_id=...&user=...&auth_date=...&hash=...";
//!     let me = service.authenticate(init_data)?;
//!
//!     for spot in service.list_spots()? {
//!         println!("{} at {}, {}", spot.title, spot.lat, spot.lon);
//!     }
//!
//!     let grant = service.grant_access(&me, 1)?;
//!     println!("tutorial: {}", grant.unlock_target);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! - `bot_token`: shared secret for `initData`, action tokens and the Bot API
//! - `moderator_id`: Telegram id of the single moderator
//! - `spot_price`, `approval_bonus`, `starting_free_attempts`: economics
//!   (defaults 20, 40, 2)
//! - `store_dir`: LMDB directory, defaulting under the platform data dir
//! - `danger_choices`, `danger_fallback`: hazard tags accepted on submission
//! - `max_notify_attempts`: delivery attempts before a notice is dropped
//!
//! See [`SpotwardenConfig`] for full documentation.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Authentication layer
pub mod auth;

// Protocol layer
pub mod protocol;

// Storage layer
pub mod store;

// Ledger layer
pub mod ledger;

// Policy layer
pub mod policy;

// Services
pub mod grants;
pub mod moderation;
pub mod query;

// Outbound notices
pub mod notify;

// Service facade (main public API)
pub mod manager;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::{FreeRefill, SpotwardenConfig};
pub use errors::SpotwardenError;
pub use manager::SpotService;
pub use notify::{FlushReport, Notice, NoticeButton, Notifier};
pub use policy::submission::{DangerChoices, SubmissionError};
pub use protocol::models::{
    AccessGrant, Identity, ModerationOutcome, Profile, SpotDetail, SpotSubmission, SpotSummary,
    SubmittedSpot,
};
pub use store::records::{PaymentMethod, SpotStatus};
pub use store::SpotStore;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
#[cfg(any(test, feature = "test-seams"))]
pub use notify::RecordingNotifier;
