//! Spotwarden configuration.

use crate::policy::submission::{DEFAULT_DANGER_CHOICES, DEFAULT_DANGER_FALLBACK};
use crate::SpotwardenError;
use std::path::PathBuf;
use std::time::Duration;

/// Default price of unlocking a spot, in currency units.
pub const DEFAULT_SPOT_PRICE: u64 = 20;

/// Default bonus credited to an author when their spot is approved.
pub const DEFAULT_APPROVAL_BONUS: u64 = 40;

/// Default free attempts granted to a brand new user.
pub const DEFAULT_STARTING_FREE_ATTEMPTS: u32 = 2;

/// Default maximum age of an authentication payload (24 hours).
pub const DEFAULT_AUTH_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Default number of delivery attempts before a queued notice is dropped.
pub const DEFAULT_MAX_NOTIFY_ATTEMPTS: u32 = 5;

/// Periodic grant of free attempts.
///
/// When configured, a user whose last refill is at least `interval` old
/// receives `amount` extra free attempts on their next authenticated contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRefill {
    /// Minimum time between two refills.
    pub interval: Duration,
    /// Attempts added per refill.
    pub amount: u32,
}

/// Configuration for the spot access core.
#[derive(Debug, Clone)]
pub struct SpotwardenConfig {
    /// Telegram bot token. Shared secret for `initData` verification and
    /// moderator action tokens; also used to call the Bot API.
    pub bot_token: String,

    /// Telegram id of the single moderator.
    pub moderator_id: u64,

    /// Directory holding the LMDB environment.
    /// Defaults to `dirs::data_dir()/<store_namespace>/` when unset.
    pub store_dir: Option<PathBuf>,

    /// Namespace used to derive the default store directory.
    pub store_namespace: String,

    /// Price charged for unlocking a spot.
    pub spot_price: u64,

    /// Bonus credited to the author on approval.
    pub approval_bonus: u64,

    /// Free attempts for a newly created user.
    pub starting_free_attempts: u32,

    /// Optional periodic free-attempt grant. Disabled by default.
    pub free_refill: Option<FreeRefill>,

    /// Reject `initData` older than this. `None` disables the check.
    pub auth_max_age: Option<Duration>,

    /// Hosts accepted for unlock targets. Empty accepts any https host.
    pub unlock_hosts: Vec<String>,

    /// Maximum spot title length in characters.
    pub max_title_len: usize,

    /// Known hazard tags for submitted spots.
    pub danger_choices: Vec<String>,

    /// Tag stored for a hazard outside `danger_choices`.
    pub danger_fallback: String,

    /// Delivery attempts, the first one included, before a notice is
    /// dropped from the outbox.
    pub max_notify_attempts: u32,

    /// Upper bound for a single notification request.
    pub notify_timeout: Duration,

    /// Bot API base URL.
    pub telegram_api_base: String,
}

impl SpotwardenConfig {
    /// Build a configuration with default economics for the given bot.
    pub fn new(bot_token: impl Into<String>, moderator_id: u64) -> Self {
        Self {
            bot_token: bot_token.into(),
            moderator_id,
            store_dir: None,
            store_namespace: "spotwarden".to_string(),
            spot_price: DEFAULT_SPOT_PRICE,
            approval_bonus: DEFAULT_APPROVAL_BONUS,
            starting_free_attempts: DEFAULT_STARTING_FREE_ATTEMPTS,
            free_refill: None,
            auth_max_age: Some(DEFAULT_AUTH_MAX_AGE),
            unlock_hosts: vec!["telegra.ph".to_string()],
            max_title_len: 200,
            danger_choices: DEFAULT_DANGER_CHOICES.iter().map(|c| c.to_string()).collect(),
            danger_fallback: DEFAULT_DANGER_FALLBACK.to_string(),
            max_notify_attempts: DEFAULT_MAX_NOTIFY_ATTEMPTS,
            notify_timeout: Duration::from_secs(10),
            telegram_api_base: "https://api.telegram.org".to_string(),
        }
    }

    /// Load configuration from process environment.
    ///
    /// `BOT_TOKEN` and `MODERATOR_ID` are required. Optional overrides:
    /// `SPOTWARDEN_DATA_DIR`, `SPOT_PRICE`, `APPROVAL_BONUS`,
    /// `STARTING_FREE_ATTEMPTS`, `AUTH_MAX_AGE_SECS` (0 disables),
    /// `UNLOCK_HOSTS` and `DANGER_CHOICES` (comma separated),
    /// `DANGER_FALLBACK` and `MAX_NOTIFY_ATTEMPTS`.
    pub fn from_env() -> Result<Self, SpotwardenError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, SpotwardenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .map(|v| v.trim().to_string())
            .ok_or_else(|| SpotwardenError::ConfigError("BOT_TOKEN is not set".to_string()))?;
        let moderator_id = parse_var(&lookup, "MODERATOR_ID")?
            .ok_or_else(|| SpotwardenError::ConfigError("MODERATOR_ID is not set".to_string()))?;

        let mut config = Self::new(bot_token, moderator_id);
        if let Some(dir) = lookup("SPOTWARDEN_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.store_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(price) = parse_var(&lookup, "SPOT_PRICE")? {
            config.spot_price = price;
        }
        if let Some(bonus) = parse_var(&lookup, "APPROVAL_BONUS")? {
            config.approval_bonus = bonus;
        }
        if let Some(attempts) = parse_var(&lookup, "STARTING_FREE_ATTEMPTS")? {
            config.starting_free_attempts = attempts;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AUTH_MAX_AGE_SECS")? {
            config.auth_max_age = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(hosts) = lookup("UNLOCK_HOSTS") {
            config.unlock_hosts = hosts
                .split(',')
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect();
        }
        if let Some(choices) = lookup("DANGER_CHOICES") {
            config.danger_choices = choices
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(fallback) = lookup("DANGER_FALLBACK").filter(|f| !f.trim().is_empty()) {
            config.danger_fallback = fallback.trim().to_string();
        }
        if let Some(attempts) = parse_var(&lookup, "MAX_NOTIFY_ATTEMPTS")? {
            config.max_notify_attempts = attempts;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), SpotwardenError> {
        if self.bot_token.trim().is_empty() {
            return Err(SpotwardenError::ConfigError(
                "bot_token cannot be empty".to_string(),
            ));
        }
        if self.moderator_id == 0 {
            return Err(SpotwardenError::ConfigError(
                "moderator_id must be a Telegram user id".to_string(),
            ));
        }
        if self.store_dir.is_none() && self.store_namespace.is_empty() {
            return Err(SpotwardenError::ConfigError(
                "store_namespace cannot be empty".to_string(),
            ));
        }
        if self.spot_price == 0 {
            return Err(SpotwardenError::ConfigError(
                "spot_price must be positive".to_string(),
            ));
        }
        if self.max_title_len == 0 {
            return Err(SpotwardenError::ConfigError(
                "max_title_len must be positive".to_string(),
            ));
        }
        if self.danger_fallback.trim().is_empty() {
            return Err(SpotwardenError::ConfigError(
                "danger_fallback cannot be empty".to_string(),
            ));
        }
        if self.max_notify_attempts == 0 {
            return Err(SpotwardenError::ConfigError(
                "max_notify_attempts must be positive".to_string(),
            ));
        }
        if let Some(refill) = &self.free_refill {
            if refill.interval.is_zero() {
                return Err(SpotwardenError::ConfigError(
                    "free_refill.interval must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve the store directory.
    pub fn resolve_store_dir(&self) -> Result<PathBuf, SpotwardenError> {
        if let Some(dir) = &self.store_dir {
            return Ok(dir.clone());
        }
        let base_dir = dirs::data_dir().ok_or_else(|| {
            SpotwardenError::ConfigError("Could not find data directory".to_string())
        })?;
        Ok(base_dir.join(&self.store_namespace))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, SpotwardenError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SpotwardenError::ConfigError(format!("{} is not a valid number", key))),
    }
}
