//! Spot Service - the main public API for Spotwarden.
//!
//! The `SpotService` wires the pieces together:
//! - `initData` verification and first-contact account creation
//! - Paid access grants over the shared ledger
//! - Spot submission and moderation, with notices to moderator and author
//! - Read-only listing and profile queries

use crate::auth::{authenticate, AuthPolicy};
use crate::clock::{Clock, SystemClock};
use crate::config::SpotwardenConfig;
use crate::grants::AccessGrants;
use crate::ledger::{Ledger, LedgerPolicy};
use crate::moderation::state::ModerationAction;
use crate::moderation::token::ActionToken;
use crate::moderation::Moderation;
use crate::notify::{messages, FlushReport, NoticeDispatcher, Notifier, TelegramNotifier};
use crate::policy::submission::{DangerChoices, SubmissionRules};
use crate::protocol::models::{
    display_handle, AccessGrant, Identity, ModerationOutcome, Profile, SpotDetail, SpotSubmission,
    SpotSummary, SubmittedSpot,
};
use crate::query::SpotQueries;
use crate::store::records::{SpotRecord, SpotStatus};
use crate::store::SpotStore;
use crate::SpotwardenError;
use std::sync::Arc;

/// Main service for Spotwarden.
///
/// This is the primary public API. Create one instance per process and
/// share it through an `Arc`; every method takes `&self`.
pub struct SpotService {
    config: SpotwardenConfig,
    clock: Arc<dyn Clock>,
    store: Arc<SpotStore>,
    auth: AuthPolicy,
    rules: SubmissionRules,
    ledger: Arc<Ledger>,
    grants: AccessGrants,
    moderation: Moderation,
    queries: SpotQueries,
    dispatcher: NoticeDispatcher,
}

impl SpotService {
    /// Create a service with the given configuration.
    ///
    /// Uses the system clock and the Telegram Bot API for notices.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - HTTP client creation fails
    /// - The store cannot be opened
    pub fn new(config: SpotwardenConfig) -> Result<Self, SpotwardenError> {
        config.validate()?;
        let store = Arc::new(SpotStore::open(&config.resolve_store_dir()?)?);
        let notifier = Arc::new(TelegramNotifier::new(&config)?);
        Self::with_components(config, store, notifier, Arc::new(SystemClock))
    }

    /// Create a service from explicit parts.
    pub fn with_components(
        config: SpotwardenConfig,
        store: Arc<SpotStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SpotwardenError> {
        config.validate()?;

        let ledger = Arc::new(Ledger::new(
            store.clone(),
            clock.clone(),
            LedgerPolicy::from(&config),
        ));
        let grants = AccessGrants::new(
            store.clone(),
            ledger.clone(),
            clock.clone(),
            config.moderator_id,
        );
        let moderation = Moderation::new(
            store.clone(),
            ledger.clone(),
            clock.clone(),
            config.moderator_id,
            config.approval_bonus,
        );
        let queries = SpotQueries::new(store.clone(), config.moderator_id);
        let dispatcher = NoticeDispatcher::new(
            notifier,
            store.clone(),
            clock.clone(),
            config.max_notify_attempts,
        );

        Ok(Self {
            auth: AuthPolicy::new(config.bot_token.clone(), config.auth_max_age),
            rules: SubmissionRules {
                max_title_len: config.max_title_len,
                unlock_hosts: config.unlock_hosts.clone(),
                danger: DangerChoices {
                    choices: config.danger_choices.clone(),
                    fallback: config.danger_fallback.clone(),
                },
            },
            config,
            clock,
            store,
            ledger,
            grants,
            moderation,
            queries,
            dispatcher,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &SpotwardenConfig {
        &self.config
    }

    /// Verify a raw `initData` payload and register the user on first contact.
    ///
    /// # Errors
    /// - `Unauthenticated` - payload missing
    /// - `MalformedCredential` - payload unparseable
    /// - `InvalidSignature` - signature mismatch or stale payload
    pub fn authenticate(&self, init_data: &str) -> Result<Identity, SpotwardenError> {
        let identity = match authenticate(init_data, &self.auth, self.clock.as_ref()) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "authentication rejected");
                return Err(e);
            }
        };
        self.ledger.ensure_user(&identity)?;
        Ok(identity)
    }

    /// Unlock a spot for the caller, charging at most once.
    ///
    /// # Errors
    /// - `SpotNotFound` - no such spot
    /// - `SpotNotApproved` - spot not listed and caller is not the author
    /// - `PaymentRequired` - no free attempt and balance below the price
    pub fn grant_access(
        &self,
        identity: &Identity,
        spot_id: u64,
    ) -> Result<AccessGrant, SpotwardenError> {
        self.grants.grant_access(identity, spot_id)
    }

    /// Submit a new spot for moderation.
    ///
    /// The spot is stored Pending with the configured price, and the
    /// moderator is notified with signed approve/reject buttons.
    ///
    /// # Errors
    /// - `InvalidSubmission` - validation failed; nothing was stored
    pub fn submit_spot(
        &self,
        identity: &Identity,
        submission: SpotSubmission,
    ) -> Result<SubmittedSpot, SpotwardenError> {
        let valid = self.rules.validate(&submission).map_err(|e| {
            tracing::debug!(user_id = identity.user_id, error = %e, "submission refused");
            SpotwardenError::from(e)
        })?;

        let spot = self.store.write(|txn| {
            let mut author = self.ledger.ensure_user_in(txn, identity)?;
            let id = self.store.next_spot_id(txn)?;
            let spot = SpotRecord {
                id,
                title: valid.title,
                lat: valid.lat,
                lon: valid.lon,
                unlock_target: valid.unlock_target,
                author_id: identity.user_id,
                author_handle: display_handle(
                    author.username.as_deref(),
                    author.first_name.as_deref(),
                ),
                danger: valid.danger,
                price: self.config.spot_price,
                status: SpotStatus::Pending,
                active: true,
                created_at: self.clock.now_utc(),
                moderated_at: None,
            };
            self.store.put_spot(txn, &spot)?;
            author.owned_spot_ids.insert(id);
            self.store.put_user(txn, &author)?;
            Ok(spot)
        })?;

        tracing::info!(
            spot_id = spot.id,
            author_id = spot.author_id,
            "spot submitted for moderation"
        );

        match messages::moderation_request(
            self.config.moderator_id,
            &spot,
            self.config.approval_bonus,
            &self.config.bot_token,
        ) {
            Ok(notice) => {
                self.dispatcher.dispatch(&notice);
            }
            Err(e) => tracing::warn!(spot_id = spot.id, error = %e, "moderation notice not built"),
        }

        Ok(SubmittedSpot {
            spot_id: spot.id,
            status: spot.status,
        })
    }

    /// Public map listing.
    pub fn list_spots(&self) -> Result<Vec<SpotSummary>, SpotwardenError> {
        self.queries.list_approved_spots()
    }

    /// Balance, free attempts and ownership of the caller.
    ///
    /// # Errors
    /// - `UserNotFound` - the identity never went through [`Self::authenticate`]
    pub fn get_profile(&self, identity: &Identity) -> Result<Profile, SpotwardenError> {
        self.queries.get_profile(identity.user_id)
    }

    /// The caller's own spots in any status.
    pub fn own_spots(&self, identity: &Identity) -> Result<Vec<SpotDetail>, SpotwardenError> {
        self.queries.own_spots(identity.user_id)
    }

    /// Spots awaiting moderation. Moderator only.
    pub fn pending_spots(&self, actor_id: u64) -> Result<Vec<SpotDetail>, SpotwardenError> {
        self.queries.pending_spots(actor_id)
    }

    /// Apply a tapped moderation button.
    ///
    /// `actor_id` is the Telegram-reported sender of the callback.
    ///
    /// # Errors
    /// - `NotModerator` - sender is not the moderator
    /// - `InvalidActionToken` - forged or malformed token
    /// - `AlreadyModerated` - stale or repeated tap
    pub fn handle_moderator_action(
        &self,
        actor_id: u64,
        token: &str,
    ) -> Result<ModerationOutcome, SpotwardenError> {
        self.moderation.require_moderator(actor_id)?;
        let token = ActionToken::verify(token, &self.config.bot_token).map_err(|e| {
            tracing::warn!(actor_id, "action token rejected");
            e
        })?;
        self.moderate(actor_id, token.spot_id, token.action)
    }

    /// Approve a pending spot and credit its author.
    pub fn approve_spot(
        &self,
        actor_id: u64,
        spot_id: u64,
    ) -> Result<ModerationOutcome, SpotwardenError> {
        self.moderate(actor_id, spot_id, ModerationAction::Approve)
    }

    /// Reject a pending spot.
    pub fn reject_spot(
        &self,
        actor_id: u64,
        spot_id: u64,
    ) -> Result<ModerationOutcome, SpotwardenError> {
        self.moderate(actor_id, spot_id, ModerationAction::Reject)
    }

    fn moderate(
        &self,
        actor_id: u64,
        spot_id: u64,
        action: ModerationAction,
    ) -> Result<ModerationOutcome, SpotwardenError> {
        let (outcome, spot) = self.moderation.apply(actor_id, spot_id, action)?;
        self.dispatcher
            .dispatch(&messages::moderation_result(&outcome, &spot));
        Ok(outcome)
    }

    /// Show or hide an approved spot on the public map. Moderator only.
    pub fn set_spot_active(
        &self,
        actor_id: u64,
        spot_id: u64,
        active: bool,
    ) -> Result<SpotDetail, SpotwardenError> {
        let spot = self.moderation.set_active(actor_id, spot_id, active)?;
        Ok(SpotDetail::from(&spot))
    }

    /// Top up a user's balance. Moderator only. Returns the new balance.
    pub fn credit_balance(
        &self,
        actor_id: u64,
        user_id: u64,
        amount: u64,
    ) -> Result<u64, SpotwardenError> {
        self.moderation.require_moderator(actor_id)?;
        let balance = self.ledger.credit(user_id, amount)?;
        tracing::info!(user_id, amount, balance, "balance credited");
        Ok(balance)
    }

    /// Grant extra free attempts. Moderator only. Returns the new count.
    pub fn grant_free_attempts(
        &self,
        actor_id: u64,
        user_id: u64,
        attempts: u32,
    ) -> Result<u32, SpotwardenError> {
        self.moderation.require_moderator(actor_id)?;
        let total = self.ledger.grant_free_attempts(user_id, attempts)?;
        tracing::info!(user_id, attempts, total, "free attempts granted");
        Ok(total)
    }

    /// Retry queued notices.
    pub fn flush_notifications(&self) -> Result<FlushReport, SpotwardenError> {
        self.dispatcher.flush()
    }

    /// Number of notices waiting for redelivery.
    pub fn pending_notifications(&self) -> Result<usize, SpotwardenError> {
        self.dispatcher.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::pipeline::sign_init_data;
    use crate::clock::MockClock;
    use crate::notify::RecordingNotifier;
    use tempfile::TempDir;

    const TOKEN: &str = "7000000001:AAtest-token";
    const MODERATOR: u64 = 900;
    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        _dir: TempDir,
        notifier: Arc<RecordingNotifier>,
        service: SpotService,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SpotStore::open(dir.path()).unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = SpotService::with_components(
            SpotwardenConfig::new(TOKEN, MODERATOR),
            store,
            notifier.clone(),
            Arc::new(MockClock::from_unix(NOW)),
        )
        .unwrap();
        Fixture {
            _dir: dir,
            notifier,
            service,
        }
    }

    fn login(service: &SpotService, user_id: u64, username: &str) -> Identity {
        let user = format!(r#"{{"id":{},"first_name":"U","username":"{}"}}"#, user_id, username);
        service
            .authenticate(&sign_init_data(TOKEN, &user, NOW, &[]))
            .unwrap()
    }

    fn submission(title: &str) -> SpotSubmission {
        SpotSubmission {
            title: title.to_string(),
            lat: 56.32,
            lon: 44.0,
            unlock_target: "telegra.ph/roof".to_string(),
            danger: None,
        }
    }

    #[test]
    fn test_first_contact_creates_account() {
        let f = fixture();
        let me = login(&f.service, 1, "ann");
        let profile = f.service.get_profile(&me).unwrap();
        assert_eq!((profile.balance, profile.free_attempts), (0, 2));
        assert_eq!(profile.username.as_deref(), Some("ann"));
    }

    #[test]
    fn test_submit_notifies_moderator_with_tokens() {
        let f = fixture();
        let author = login(&f.service, 1, "ann");
        let submitted = f.service.submit_spot(&author, submission("Roof")).unwrap();
        assert_eq!(submitted.status, SpotStatus::Pending);

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, MODERATOR);

        let own = f.service.own_spots(&author).unwrap();
        assert_eq!(own[0].author_handle, "@ann");
        assert_eq!(own[0].unlock_target, "https://telegra.ph/roof");
        assert!(f.service.list_spots().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_submission_stores_nothing() {
        let f = fixture();
        let author = login(&f.service, 1, "ann");
        let err = f.service.submit_spot(&author, submission(" ")).unwrap_err();
        assert!(matches!(err, SpotwardenError::InvalidSubmission(_)));
        assert!(f.service.own_spots(&author).unwrap().is_empty());
        assert!(f.notifier.sent().is_empty());
    }

    #[test]
    fn test_button_tap_approves_and_notifies_author() {
        let f = fixture();
        let author = login(&f.service, 1, "ann");
        f.service.submit_spot(&author, submission("Roof")).unwrap();
        let approve = f.notifier.sent()[0].buttons[0].callback_data.clone();

        let outcome = f.service.handle_moderator_action(MODERATOR, &approve).unwrap();
        assert_eq!(outcome.status, SpotStatus::Approved);
        assert_eq!(f.service.get_profile(&author).unwrap().balance, 40);

        let author_notice = f.notifier.sent().pop().unwrap();
        assert_eq!(author_notice.chat_id, 1);

        assert!(matches!(
            f.service.handle_moderator_action(MODERATOR, &approve),
            Err(SpotwardenError::AlreadyModerated { .. })
        ));
        assert_eq!(f.service.get_profile(&author).unwrap().balance, 40);
    }

    #[test]
    fn test_button_tap_by_stranger_refused() {
        let f = fixture();
        let author = login(&f.service, 1, "ann");
        f.service.submit_spot(&author, submission("Roof")).unwrap();
        let approve = f.notifier.sent()[0].buttons[0].callback_data.clone();

        assert!(matches!(
            f.service.handle_moderator_action(1, &approve),
            Err(SpotwardenError::NotModerator)
        ));
    }

    #[test]
    fn test_forged_token_refused() {
        let f = fixture();
        assert!(matches!(
            f.service.handle_moderator_action(MODERATOR, "approve:1:AAAAAAAAAAAAAAAAAAAAAA"),
            Err(SpotwardenError::InvalidActionToken)
        ));
    }

    #[test]
    fn test_failed_notice_is_queued_not_fatal() {
        let f = fixture();
        let author = login(&f.service, 1, "ann");
        f.notifier.set_failing(true);

        assert!(f.service.submit_spot(&author, submission("Roof")).is_ok());
        assert_eq!(f.service.pending_notifications().unwrap(), 1);

        f.notifier.set_failing(false);
        let report = f.service.flush_notifications().unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(f.notifier.sent()[0].chat_id, MODERATOR);
    }

    #[test]
    fn test_admin_operations_require_moderator() {
        let f = fixture();
        let user = login(&f.service, 1, "ann");
        assert!(matches!(
            f.service.credit_balance(1, 1, 100),
            Err(SpotwardenError::NotModerator)
        ));
        assert_eq!(f.service.credit_balance(MODERATOR, 1, 100).unwrap(), 100);
        assert_eq!(f.service.grant_free_attempts(MODERATOR, 1, 3).unwrap(), 5);
        assert_eq!(f.service.get_profile(&user).unwrap().balance, 100);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SpotStore::open(dir.path()).unwrap());
        let result = SpotService::with_components(
            SpotwardenConfig::new("", MODERATOR),
            store,
            Arc::new(RecordingNotifier::new()),
            Arc::new(MockClock::from_unix(NOW)),
        );
        assert!(matches!(result, Err(SpotwardenError::ConfigError(_))));
    }
}
