//! Persisted record formats.
//!
//! Records are stored as JSON values in LMDB. Every field that later
//! versions may add carries `#[serde(default)]` so older rows keep loading.

use crate::SpotwardenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ledger row for one Telegram user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Telegram user id.
    pub id: u64,
    /// Currency units available for purchases.
    pub balance: u64,
    /// Remaining free unlocks.
    pub free_attempts: u32,
    /// Spots this user authored.
    #[serde(default)]
    pub owned_spot_ids: BTreeSet<u64>,
    /// Latest known `@handle`.
    #[serde(default)]
    pub username: Option<String>,
    /// Latest known first name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// First authenticated contact.
    pub created_at: DateTime<Utc>,
    /// Last periodic free-attempt grant.
    #[serde(default)]
    pub last_free_refill: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// A fresh user with the starting allowance.
    pub fn new(id: u64, starting_free_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            balance: 0,
            free_attempts: starting_free_attempts,
            owned_spot_ids: BTreeSet::new(),
            username: None,
            first_name: None,
            created_at: now,
            last_free_refill: Some(now),
        }
    }
}

/// Moderation status of a spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotStatus {
    /// Waiting for the moderator.
    Pending,
    /// Publicly listed.
    Approved,
    /// Refused; never listed.
    Rejected,
}

impl SpotStatus {
    /// Whether no further transition is defined.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SpotStatus::Pending)
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpotStatus::Pending => "pending",
            SpotStatus::Approved => "approved",
            SpotStatus::Rejected => "rejected",
        })
    }
}

/// A geographic spot and its gated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRecord {
    /// Identifier.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// External document URL, revealed only through a grant.
    pub unlock_target: String,
    /// Telegram id of the author.
    pub author_id: u64,
    /// Author handle captured at submission.
    pub author_handle: String,
    /// Hazard tag, already mapped onto the known list.
    #[serde(default)]
    pub danger: Option<String>,
    /// Price fixed at submission time.
    pub price: u64,
    /// Moderation status.
    pub status: SpotStatus,
    /// Moderator-controlled listing switch for approved spots.
    pub active: bool,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// When the moderator decided.
    #[serde(default)]
    pub moderated_at: Option<DateTime<Utc>>,
}

impl SpotRecord {
    /// Whether the spot shows up in the public listing.
    pub fn is_listed(&self) -> bool {
        self.status == SpotStatus::Approved && self.active
    }
}

/// How a grant was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// The caller authored the spot.
    Author,
    /// One free attempt was consumed.
    FreeAttempt,
    /// Balance was debited.
    Balance {
        /// Units debited.
        amount: u64,
    },
}

impl PaymentMethod {
    /// Whether this method consumed ledger funds.
    pub fn is_paid(self) -> bool {
        !matches!(self, PaymentMethod::Author)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Author => f.write_str("author"),
            PaymentMethod::FreeAttempt => f.write_str("free_attempt"),
            PaymentMethod::Balance { amount } => write!(f, "balance({})", amount),
        }
    }
}

/// Recorded fact that a user may view a spot's unlock target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    /// Telegram user id.
    pub user_id: u64,
    /// Target spot.
    pub spot_id: u64,
    /// How access was paid for.
    pub method: PaymentMethod,
    /// When the grant was recorded.
    pub granted_at: DateTime<Utc>,
}

impl GrantRecord {
    /// Storage key. Zero padded so keys sort by user, then spot.
    pub fn key(user_id: u64, spot_id: u64) -> String {
        format!("{:020}:{:020}", user_id, spot_id)
    }
}

/// A notice waiting for redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Identifier.
    pub id: u64,
    /// JSON-encoded notice.
    pub payload: String,
    /// Delivery attempts so far.
    pub attempts: u32,
    /// Error from the latest attempt.
    pub last_error: String,
    /// When the notice was first queued.
    pub enqueued_at: DateTime<Utc>,
    /// Set while a flush is delivering this entry; expires on its own.
    #[serde(default)]
    pub claimed_until: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Serialize a value into an outbox payload.
    pub fn encode<T: Serialize>(value: &T) -> Result<String, SpotwardenError> {
        serde_json::to_string(value)
            .map_err(|e| SpotwardenError::ProtocolError(format!("Failed to encode notice: {}", e)))
    }

    /// Deserialize the payload.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, SpotwardenError> {
        serde_json::from_str(&self.payload)
            .map_err(|e| SpotwardenError::ProtocolError(format!("Failed to decode notice: {}", e)))
    }
}
