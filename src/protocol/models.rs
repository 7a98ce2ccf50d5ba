//! Request and response types exchanged with the view layer.

use crate::store::records::{PaymentMethod, SpotRecord, SpotStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Display handle used when a user has neither username nor first name.
pub const ANONYMOUS_HANDLE: &str = "Anonymous";

/// User object embedded in `initData`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    /// Identifier.
    pub id: u64,
    /// First name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// `@handle` without the at sign.
    #[serde(default)]
    pub username: Option<String>,
}

/// A verified Telegram identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Telegram user id.
    pub user_id: u64,
    /// `@handle` without the at sign.
    pub username: Option<String>,
    /// First name as shown in Telegram.
    pub first_name: Option<String>,
    /// When Telegram signed the payload.
    pub auth_date: DateTime<Utc>,
}

/// `@username`, else first name, else [`ANONYMOUS_HANDLE`].
pub fn display_handle(username: Option<&str>, first_name: Option<&str>) -> String {
    match (username, first_name.map(str::trim)) {
        (Some(u), _) if !u.is_empty() => format!("@{}", u),
        (_, Some(f)) if !f.is_empty() => f.to_string(),
        _ => ANONYMOUS_HANDLE.to_string(),
    }
}

/// Public map entry. Never carries the unlock target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotSummary {
    /// Identifier.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Author handle captured at submission.
    pub author_handle: String,
    /// Hazard tag, if the author gave one.
    #[serde(default)]
    pub danger: Option<String>,
}

impl From<&SpotRecord> for SpotSummary {
    fn from(spot: &SpotRecord) -> Self {
        Self {
            id: spot.id,
            title: spot.title.clone(),
            lat: spot.lat,
            lon: spot.lon,
            author_handle: spot.author_handle.clone(),
            danger: spot.danger.clone(),
        }
    }
}

/// A spot as seen by its author or the moderator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotDetail {
    /// Identifier.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// External document URL.
    pub unlock_target: String,
    /// Telegram id of the author.
    pub author_id: u64,
    /// Author handle captured at submission.
    pub author_handle: String,
    /// Hazard tag, if the author gave one.
    #[serde(default)]
    pub danger: Option<String>,
    /// Price fixed at submission time.
    pub price: u64,
    /// Moderation status.
    pub status: SpotStatus,
    /// Listing switch.
    pub active: bool,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl From<&SpotRecord> for SpotDetail {
    fn from(spot: &SpotRecord) -> Self {
        Self {
            id: spot.id,
            title: spot.title.clone(),
            lat: spot.lat,
            lon: spot.lon,
            unlock_target: spot.unlock_target.clone(),
            author_id: spot.author_id,
            author_handle: spot.author_handle.clone(),
            danger: spot.danger.clone(),
            price: spot.price,
            status: spot.status,
            active: spot.active,
            created_at: spot.created_at,
        }
    }
}

/// A user's ledger position and ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Telegram user id.
    pub user_id: u64,
    /// Currency units available.
    pub balance: u64,
    /// Remaining free unlocks.
    pub free_attempts: u32,
    /// `@handle` without the at sign.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Spots this user authored, in any status.
    pub owned_spot_ids: BTreeSet<u64>,
    /// Spots this user holds a grant for.
    pub unlocked_spot_ids: BTreeSet<u64>,
}

/// Result of a successful `grant_access`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Target spot.
    pub spot_id: u64,
    /// The external document URL.
    pub unlock_target: String,
    /// How access was paid for.
    pub method: PaymentMethod,
    /// True when an earlier grant was returned and nothing was charged.
    pub replayed: bool,
}

impl AccessGrant {
    /// Whether this call consumed a free attempt or balance.
    pub fn charged(&self) -> bool {
        !self.replayed && self.method.is_paid()
    }
}

/// A new spot as submitted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotSubmission {
    /// Display title.
    pub title: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// External document URL.
    pub unlock_target: String,
    /// Optional hazard tag; unknown tags are stored as the catch-all.
    #[serde(default)]
    pub danger: Option<String>,
}

/// Acknowledgement of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedSpot {
    /// Target spot.
    pub spot_id: u64,
    /// Moderation status.
    pub status: SpotStatus,
}

/// Result of a moderator transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationOutcome {
    /// Target spot.
    pub spot_id: u64,
    /// Telegram id of the author.
    pub author_id: u64,
    /// Moderation status.
    pub status: SpotStatus,
    /// Bonus credited to the author, if any.
    pub bonus_credited: Option<u64>,
    /// Author balance after the bonus.
    pub author_balance: Option<u64>,
}
