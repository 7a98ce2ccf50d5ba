//! Verification pipeline composing all `initData` checks.
//!
//! 1. Parse the payload (fail-closed on missing `hash`)
//! 2. Verify the HMAC signature over the data-check string
//! 3. Check `auth_date` freshness
//! 4. Extract the Telegram user

use crate::auth::freshness::check_freshness;
use crate::auth::init_data::InitData;
use crate::auth::signature::{derive_key, verify_hex, WEB_APP_DOMAIN};
use crate::clock::Clock;
use crate::protocol::models::Identity;
use crate::SpotwardenError;
use std::time::Duration;

/// Process-scoped verification settings.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    /// Bot token the payloads are signed for.
    pub bot_token: String,
    /// Reject payloads older than this.
    pub max_age: Option<Duration>,
}

impl AuthPolicy {
    /// Build a policy from a bot token and freshness window.
    pub fn new(bot_token: impl Into<String>, max_age: Option<Duration>) -> Self {
        Self {
            bot_token: bot_token.into(),
            max_age,
        }
    }
}

/// Authenticate a raw `initData` payload.
///
/// # Returns
/// * `Ok(Identity)` - verified user identity and profile fields
/// * `Err(Unauthenticated)` - payload missing
/// * `Err(MalformedCredential)` - payload unparseable
/// * `Err(InvalidSignature)` - signature mismatch or payload expired
pub fn authenticate(
    raw: &str,
    policy: &AuthPolicy,
    clock: &dyn Clock,
) -> Result<Identity, SpotwardenError> {
    if policy.bot_token.is_empty() {
        return Err(SpotwardenError::ConfigError(
            "bot_token cannot be empty".to_string(),
        ));
    }

    let data = InitData::parse(raw)?;

    let key = derive_key(WEB_APP_DOMAIN, &policy.bot_token)?;
    verify_hex(&key, &data.data_check_string(), data.hash())?;

    let auth_date = data.auth_date()?;
    check_freshness(auth_date, policy.max_age, clock)?;

    let user = data.user()?;
    Ok(Identity {
        user_id: user.id,
        username: user.username.filter(|u| !u.is_empty()),
        first_name: user.first_name.filter(|n| !n.trim().is_empty()),
        auth_date,
    })
}

/// Build a signed `initData` string for a user, as Telegram would.
#[cfg(any(test, feature = "test-seams"))]
pub fn sign_init_data(
    bot_token: &str,
    user_json: &str,
    auth_date: i64,
    extra: &[(&str, &str)],
) -> String {
    use crate::auth::signature::sign_hex;
    use std::collections::BTreeMap;

    let mut fields: BTreeMap<&str, String> = BTreeMap::new();
    fields.insert("auth_date", auth_date.to_string());
    fields.insert("user", user_json.to_string());
    for (k, v) in extra {
        fields.insert(*k, v.to_string());
    }
    let check = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n");
    let key = derive_key(WEB_APP_DOMAIN, bot_token).expect("HMAC accepts any key");
    let hash = sign_hex(&key, &check).expect("HMAC accepts any key");

    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &fields {
        out.append_pair(k, v);
    }
    out.append_pair("hash", &hash);
    out.finish()
}
