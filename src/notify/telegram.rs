//! Reqwest-based Telegram Bot API notifier.
//!
//! Sends notices with `sendMessage`. Buttons become a one-row
//! `inline_keyboard`.

use crate::config::SpotwardenConfig;
use crate::notify::{Notice, Notifier};
use crate::SpotwardenError;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use serde_json::{json, Value};

/// Bot API envelope.
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API client.
pub struct TelegramNotifier {
    client: Client,
    user_agent: String,
    endpoint: String,
}

impl TelegramNotifier {
    /// Create a notifier from config.
    pub fn new(config: &SpotwardenConfig) -> Result<Self, SpotwardenError> {
        let client = Client::builder()
            .timeout(config.notify_timeout)
            .build()
            .map_err(|e| {
                SpotwardenError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            user_agent: build_user_agent(),
            endpoint: send_message_url(&config.telegram_api_base, &config.bot_token),
        })
    }

    /// Build the `sendMessage` request body.
    pub fn request_body(notice: &Notice) -> Value {
        let mut body = json!({
            "chat_id": notice.chat_id,
            "text": notice.text,
        });
        if !notice.buttons.is_empty() {
            let row: Vec<Value> = notice
                .buttons
                .iter()
                .map(|b| json!({ "text": b.label, "callback_data": b.callback_data }))
                .collect();
            body["reply_markup"] = json!({ "inline_keyboard": [row] });
        }
        body
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, notice: &Notice) -> Result<(), SpotwardenError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, &self.user_agent)
            .json(&Self::request_body(notice))
            .send()
            // Request errors can echo the URL, which embeds the token.
            .map_err(|e| {
                SpotwardenError::NotifyTransport(format!(
                    "sendMessage failed: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status().as_u16();
        let reply: ApiReply = response.json().map_err(|e| {
            let detail = format!("Bad Bot API reply ({}): {}", status, e.without_url());
            if is_retryable_status(status) {
                SpotwardenError::NotifyTransport(detail)
            } else {
                SpotwardenError::ProtocolError(detail)
            }
        })?;

        if !reply.ok {
            let reason = reply.description.unwrap_or_default();
            return Err(if is_retryable_status(status) {
                SpotwardenError::NotifyTransport(format!(
                    "Bot API busy ({}): {}",
                    status, reason
                ))
            } else {
                SpotwardenError::NotifyRejected { status, reason }
            });
        }

        tracing::debug!(chat_id = notice.chat_id, "notice delivered");
        Ok(())
    }
}

/// Rate limiting and server errors; everything else is final.
fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

fn send_message_url(base: &str, bot_token: &str) -> String {
    format!("{}/bot{}/sendMessage", base.trim_end_matches('/'), bot_token)
}

/// Build a User-Agent string.
///
/// Format: `spotwarden/<version>`
pub fn build_user_agent() -> String {
    format!("spotwarden/{}", env!("CARGO_PKG_VERSION"))
}
