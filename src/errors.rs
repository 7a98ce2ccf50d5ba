//! Spotwarden error types.

use crate::policy::submission::SubmissionError;
use crate::store::records::SpotStatus;
use thiserror::Error;

/// Errors that can occur while authenticating, charging, or moderating.
#[derive(Debug, Error)]
pub enum SpotwardenError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No authentication payload was supplied.
    #[error("Authentication payload missing")]
    Unauthenticated,

    /// The authentication payload could not be parsed.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// Signature mismatch, or the payload is outside the freshness window.
    #[error("Credential signature invalid or expired")]
    InvalidSignature,

    /// No spot with this identifier exists.
    #[error("Spot {spot_id} not found")]
    SpotNotFound {
        /// The requested spot.
        spot_id: u64,
    },

    /// The spot exists but is not publicly available.
    #[error("Spot {spot_id} is not approved")]
    SpotNotApproved {
        /// The requested spot.
        spot_id: u64,
    },

    /// No user record exists for this identity.
    #[error("User {user_id} not found")]
    UserNotFound {
        /// The requested user.
        user_id: u64,
    },

    /// Balance is lower than the requested debit.
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Current balance.
        balance: u64,
        /// Amount that was requested.
        required: u64,
    },

    /// The user has no free attempts left.
    #[error("No free attempts left")]
    NoFreeAttempts,

    /// Neither a free attempt nor enough balance is available.
    #[error("Payment required: {price} units or a free attempt")]
    PaymentRequired {
        /// Price of the spot.
        price: u64,
    },

    /// A credit would overflow the balance counter.
    #[error("Ledger overflow for user {user_id}")]
    LedgerOverflow {
        /// The affected user.
        user_id: u64,
    },

    /// The spot already left the Pending state.
    #[error("Spot {spot_id} already moderated ({status})")]
    AlreadyModerated {
        /// The spot that was targeted.
        spot_id: u64,
        /// Its current status.
        status: SpotStatus,
    },

    /// The caller is not the moderator.
    #[error("Moderator privileges required")]
    NotModerator,

    /// A moderator action token failed to parse or verify.
    #[error("Invalid moderator action token")]
    InvalidActionToken,

    /// The submitted spot failed validation.
    #[error(transparent)]
    InvalidSubmission(#[from] SubmissionError),

    /// Record store failure.
    #[error("Store I/O error: {0}")]
    StoreIO(String),

    /// Notification delivery failure.
    #[error("Notification transport error: {0}")]
    NotifyTransport(String),

    /// The Bot API refused a message for good (blocked bot, unknown chat).
    #[error("Notification rejected ({status}): {reason}")]
    NotifyRejected {
        /// HTTP status of the reply.
        status: u16,
        /// Bot API description.
        reason: String,
    },

    /// Failed to encode or decode a wire payload.
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl SpotwardenError {
    /// Whether this error belongs to the authentication layer.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::MalformedCredential(_) | Self::InvalidSignature
        )
    }

    /// Whether a failed notice may go through on a later attempt.
    pub fn is_retryable_notice(&self) -> bool {
        matches!(self, Self::NotifyTransport(_))
    }
}
