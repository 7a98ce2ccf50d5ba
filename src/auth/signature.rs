//! HMAC-SHA256 key derivation and signature verification.

use crate::SpotwardenError;
use hmac::{Hmac, Mac};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Domain-separation string for `initData` verification keys.
pub const WEB_APP_DOMAIN: &[u8] = b"WebAppData";

/// A 32-byte key derived from the bot token.
pub type DerivedKey = [u8; 32];

/// Cache of derived keys, indexed by a fingerprint of (domain, secret).
static KEY_CACHE: OnceCell<RwLock<HashMap<String, DerivedKey>>> = OnceCell::new();

/// Compute HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<DerivedKey, SpotwardenError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SpotwardenError::ConfigError(format!("Invalid HMAC key: {}", e)))?;
    mac.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn fingerprint(domain: &[u8], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update([0u8]);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive a verification key: `HMAC-SHA256(key = domain, message = secret)`.
///
/// The result is cached after first derivation.
pub fn derive_key(domain: &[u8], secret: &str) -> Result<DerivedKey, SpotwardenError> {
    let cache = KEY_CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    let cache_key = fingerprint(domain, secret);
    if let Ok(guard) = cache.read() {
        if let Some(key) = guard.get(&cache_key) {
            return Ok(*key);
        }
    }

    let key = hmac_sha256(domain, secret.as_bytes())?;

    // Best-effort insert; a poisoned lock still yields the derived key.
    if let Ok(mut guard) = cache.write() {
        guard.insert(cache_key, key);
    }

    Ok(key)
}

/// Compute the hex signature of a data-check string.
pub fn sign_hex(key: &DerivedKey, data_check_string: &str) -> Result<String, SpotwardenError> {
    Ok(hex::encode(hmac_sha256(key, data_check_string.as_bytes())?))
}

/// Verify a hex signature over a data-check string in constant time.
///
/// # Errors
/// * `InvalidSignature` - signature is not hex, or does not match
pub fn verify_hex(
    key: &DerivedKey,
    data_check_string: &str,
    signature_hex: &str,
) -> Result<(), SpotwardenError> {
    let provided = hex::decode(signature_hex.trim()).map_err(|_| SpotwardenError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SpotwardenError::ConfigError(format!("Invalid HMAC key: {}", e)))?;
    mac.update(data_check_string.as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| SpotwardenError::InvalidSignature)
}
