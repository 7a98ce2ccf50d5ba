//! `initData` parsing and data-check string construction.
//!
//! The payload is a URL-encoded query string:
//! ```text
//! query_id=AAH...&user=%7B%22id%22%3A42%7D&auth_date=1700000000&hash=9f2c...
//! ```
//! The data-check string is every field except `hash`, sorted by key,
//! rendered as `key=value` and joined with `\n`.

use crate::protocol::models::TelegramUser;
use crate::SpotwardenError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Name of the signature field.
pub const HASH_FIELD: &str = "hash";

/// Name of the signing timestamp field.
pub const AUTH_DATE_FIELD: &str = "auth_date";

/// Name of the field carrying the user JSON object.
pub const USER_FIELD: &str = "user";

/// Decoded `initData` payload.
#[derive(Debug, Clone)]
pub struct InitData {
    fields: BTreeMap<String, String>,
    hash: String,
}

impl InitData {
    /// Parse a raw `initData` string.
    ///
    /// # Errors
    /// * `Unauthenticated` - payload is empty
    /// * `MalformedCredential` - duplicate fields, empty keys, or no `hash`
    pub fn parse(raw: &str) -> Result<Self, SpotwardenError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SpotwardenError::Unauthenticated);
        }

        let mut fields = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if key.is_empty() {
                return Err(SpotwardenError::MalformedCredential(
                    "empty field name".to_string(),
                ));
            }
            if fields.insert(key.to_string(), value.into_owned()).is_some() {
                return Err(SpotwardenError::MalformedCredential(format!(
                    "duplicate field: {}",
                    key
                )));
            }
        }

        let hash = fields
            .remove(HASH_FIELD)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SpotwardenError::MalformedCredential("missing hash".to_string()))?;

        Ok(Self { fields, hash })
    }

    /// The hex signature supplied by the client.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Look up a signed field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Canonical string the signature is computed over.
    pub fn data_check_string(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Signing time from `auth_date`.
    pub fn auth_date(&self) -> Result<DateTime<Utc>, SpotwardenError> {
        let raw = self.field(AUTH_DATE_FIELD).ok_or_else(|| {
            SpotwardenError::MalformedCredential("missing auth_date".to_string())
        })?;
        let secs: i64 = raw.parse().map_err(|_| {
            SpotwardenError::MalformedCredential(format!("invalid auth_date: {}", raw))
        })?;
        DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            SpotwardenError::MalformedCredential(format!("auth_date out of range: {}", raw))
        })
    }

    /// The Telegram user the payload was issued for.
    pub fn user(&self) -> Result<TelegramUser, SpotwardenError> {
        let raw = self
            .field(USER_FIELD)
            .ok_or_else(|| SpotwardenError::MalformedCredential("missing user".to_string()))?;
        serde_json::from_str(raw)
            .map_err(|e| SpotwardenError::MalformedCredential(format!("invalid user: {}", e)))
    }
}
