//! Moderator action tokens.
//!
//! Format: `<action>:<spot_id>:<mac>`, where `<mac>` is the left 16 bytes of
//! `HMAC-SHA256(key, "<action>:<spot_id>")`, base64url without padding. The
//! key is derived from the bot token under its own domain string, so a token
//! can never double as an `initData` signature. The longest token is 51
//! bytes, inside Telegram's 64-byte callback-data limit.

use crate::auth::signature::{derive_key, DerivedKey, HmacSha256};
use crate::moderation::state::ModerationAction;
use crate::SpotwardenError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::Mac;

/// Domain-separation string for moderation token keys.
pub const MODERATION_DOMAIN: &[u8] = b"SpotModeration";

/// Truncated MAC length in bytes.
pub const TAG_LEN: usize = 16;

/// A verified moderator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionToken {
    /// Requested transition.
    pub action: ModerationAction,
    /// Target spot.
    pub spot_id: u64,
}

impl ActionToken {
    /// Create a token for an action on a spot.
    pub fn new(action: ModerationAction, spot_id: u64) -> Self {
        Self { action, spot_id }
    }

    fn message(&self) -> String {
        format!("{}:{}", self.action, self.spot_id)
    }

    fn mac(key: &DerivedKey) -> Result<HmacSha256, SpotwardenError> {
        HmacSha256::new_from_slice(key)
            .map_err(|e| SpotwardenError::ConfigError(format!("Invalid HMAC key: {}", e)))
    }

    /// Encode and sign the token.
    pub fn encode(&self, bot_token: &str) -> Result<String, SpotwardenError> {
        let key = derive_key(MODERATION_DOMAIN, bot_token)?;
        let message = self.message();
        let mut mac = Self::mac(&key)?;
        mac.update(message.as_bytes());
        let tag = mac.finalize().into_bytes();
        Ok(format!(
            "{}:{}",
            message,
            URL_SAFE_NO_PAD.encode(&tag[..TAG_LEN])
        ))
    }

    /// Parse a token and verify its MAC in constant time.
    ///
    /// # Errors
    /// * `InvalidActionToken` - wrong shape, unknown action, or bad MAC
    pub fn verify(raw: &str, bot_token: &str) -> Result<Self, SpotwardenError> {
        let mut parts = raw.trim().splitn(3, ':');
        let (Some(action), Some(id), Some(tag)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(SpotwardenError::InvalidActionToken);
        };

        let action: ModerationAction = action
            .parse()
            .map_err(|_| SpotwardenError::InvalidActionToken)?;
        let spot_id: u64 = id.parse().map_err(|_| SpotwardenError::InvalidActionToken)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| SpotwardenError::InvalidActionToken)?;
        if tag.len() != TAG_LEN {
            return Err(SpotwardenError::InvalidActionToken);
        }

        let token = Self::new(action, spot_id);
        let key = derive_key(MODERATION_DOMAIN, bot_token)?;
        let mut mac = Self::mac(&key)?;
        mac.update(token.message().as_bytes());
        mac.verify_truncated_left(&tag)
            .map_err(|_| SpotwardenError::InvalidActionToken)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "7000000001:AAtest-token";

    #[test]
    fn test_encode_shape() {
        let raw = ActionToken::new(ModerationAction::Approve, 42)
            .encode(TOKEN)
            .unwrap();
        assert!(raw.starts_with("approve:42:"));
        assert_eq!(raw.len(), "approve:42:".len() + 22);
    }

    #[test]
    fn test_largest_token_fits_callback_limit() {
        let raw = ActionToken::new(ModerationAction::Approve, u64::MAX)
            .encode(TOKEN)
            .unwrap();
        assert!(raw.len() <= 64, "token is {} bytes", raw.len());
    }

    #[test]
    fn test_verify_accepts_own_tokens() {
        for action in [ModerationAction::Approve, ModerationAction::Reject] {
            let raw = ActionToken::new(action, 7).encode(TOKEN).unwrap();
            let token = ActionToken::verify(&raw, TOKEN).unwrap();
            assert_eq!(token, ActionToken::new(action, 7));
        }
    }

    #[test]
    fn test_action_swap_rejected() {
        let raw = ActionToken::new(ModerationAction::Reject, 7)
            .encode(TOKEN)
            .unwrap();
        let swapped = raw.replacen("reject", "approve", 1);
        assert!(matches!(
            ActionToken::verify(&swapped, TOKEN),
            Err(SpotwardenError::InvalidActionToken)
        ));
    }

    #[test]
    fn test_spot_swap_rejected() {
        let raw = ActionToken::new(ModerationAction::Approve, 7)
            .encode(TOKEN)
            .unwrap();
        let swapped = raw.replacen(":7:", ":8:", 1);
        assert!(ActionToken::verify(&swapped, TOKEN).is_err());
    }

    #[test]
    fn test_other_bot_rejected() {
        let raw = ActionToken::new(ModerationAction::Approve, 7)
            .encode("999:other")
            .unwrap();
        assert!(ActionToken::verify(&raw, TOKEN).is_err());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for raw in ["", "approve", "approve:7", "ban:7:AAAA", "approve:x:AAAA", "approve:7:!!"] {
            assert!(
                matches!(
                    ActionToken::verify(raw, TOKEN),
                    Err(SpotwardenError::InvalidActionToken)
                ),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_short_tag_rejected() {
        let raw = ActionToken::new(ModerationAction::Approve, 7)
            .encode(TOKEN)
            .unwrap();
        let (head, tag) = raw.rsplit_once(':').unwrap();
        let short = format!("{}:{}", head, &tag[..4]);
        assert!(ActionToken::verify(&short, TOKEN).is_err());
    }
}
