//! Outbound notices to the moderator and to spot authors.
//!
//! Delivery is best effort. A notice that fails to send is logged and, when
//! the failure is transient, parked in the store's outbox; it never fails or
//! rolls back the operation that produced it.

pub mod messages;
pub mod outbox;
pub mod telegram;

use crate::SpotwardenError;
use serde::{Deserialize, Serialize};

pub use outbox::{FlushReport, NoticeDispatcher};
pub use telegram::TelegramNotifier;

/// An inline button attached to a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeButton {
    /// Button caption.
    pub label: String,
    /// Opaque payload returned to the bot when tapped.
    pub callback_data: String,
}

/// A chat message to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Recipient chat (a Telegram user id for private chats).
    pub chat_id: u64,
    /// Plain message text.
    pub text: String,
    /// One row of inline buttons; empty for none.
    #[serde(default)]
    pub buttons: Vec<NoticeButton>,
}

/// Transport for notices.
pub trait Notifier: Send + Sync {
    /// Deliver one notice.
    fn send(&self, notice: &Notice) -> Result<(), SpotwardenError>;
}

/// Notifier that records notices in memory, optionally failing every send.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<Notice>>,
    failing: std::sync::atomic::AtomicBool,
    rejecting: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-seams"))]
impl RecordingNotifier {
    /// A notifier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make subsequent sends fail with a final rejection, like a chat that
    /// blocked the bot.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting
            .store(rejecting, std::sync::atomic::Ordering::SeqCst);
    }

    /// Notices delivered so far.
    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().expect("recorder poisoned").clone()
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Notifier for RecordingNotifier {
    fn send(&self, notice: &Notice) -> Result<(), SpotwardenError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SpotwardenError::NotifyTransport(
                "recording notifier set to fail".to_string(),
            ));
        }
        if self.rejecting.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SpotwardenError::NotifyRejected {
                status: 403,
                reason: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent
            .lock()
            .expect("recorder poisoned")
            .push(notice.clone());
        Ok(())
    }
}
