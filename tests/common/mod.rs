//! Shared harness for integration tests.
//!
//! Integration tests build without the `test-seams` feature, so the clock,
//! notifier and `initData` signer live here.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use spotwarden::{
    Clock, Identity, Notice, Notifier, SpotService, SpotStore, SpotSubmission, SpotwardenConfig,
    SpotwardenError,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TOKEN: &str = "7000000001:AAintegration-token";
pub const MODERATOR: u64 = 424_242;
pub const NOW: i64 = 1_735_689_600; // 2025-01-01T00:00:00Z

pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn at(secs: i64) -> Self {
        Self(Mutex::new(DateTime::from_timestamp(secs, 0).unwrap()))
    }

    pub fn advance_secs(&self, secs: i64) {
        *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct Inbox {
    sent: Mutex<Vec<Notice>>,
    down: AtomicBool,
    blocked: Mutex<Vec<u64>>,
}

impl Inbox {
    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().unwrap().clone()
    }

    pub fn to(&self, chat_id: u64) -> Vec<Notice> {
        self.sent()
            .into_iter()
            .filter(|n| n.chat_id == chat_id)
            .collect()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// The chat refuses the bot from now on.
    pub fn block(&self, chat_id: u64) {
        self.blocked.lock().unwrap().push(chat_id);
    }
}

impl Notifier for Inbox {
    fn send(&self, notice: &Notice) -> Result<(), SpotwardenError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SpotwardenError::NotifyTransport("bot api down".into()));
        }
        if self.blocked.lock().unwrap().contains(&notice.chat_id) {
            return Err(SpotwardenError::NotifyRejected {
                status: 403,
                reason: "Forbidden: bot was blocked by the user".into(),
            });
        }
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Sign `initData` the way Telegram does.
pub fn sign_init_data(bot_token: &str, fields: &[(&str, String)]) -> String {
    let sorted: BTreeMap<&str, &str> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let check = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    let mut secret = Hmac::<Sha256>::new_from_slice(b"WebAppData").unwrap();
    secret.update(bot_token.as_bytes());
    let secret = secret.finalize().into_bytes();

    let mut mac = Hmac::<Sha256>::new_from_slice(&secret).unwrap();
    mac.update(check.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &sorted {
        out.append_pair(k, v);
    }
    out.append_pair("hash", &hash);
    out.finish()
}

pub fn init_data_for(user_id: u64, username: &str, auth_date: i64) -> String {
    sign_init_data(
        TOKEN,
        &[
            ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc".to_string()),
            (
                "user",
                format!(
                    r#"{{"id":{},"first_name":"Test","username":"{}","language_code":"en"}}"#,
                    user_id, username
                ),
            ),
            ("auth_date", auth_date.to_string()),
        ],
    )
}

pub struct Harness {
    pub dir: TempDir,
    pub clock: Arc<TestClock>,
    pub inbox: Arc<Inbox>,
    pub service: Arc<SpotService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut SpotwardenConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(TestClock::at(NOW));
        let inbox = Arc::new(Inbox::default());
        let service = Self::open(dir.path(), clock.clone(), inbox.clone(), adjust);
        Self {
            dir,
            clock,
            inbox,
            service: Arc::new(service),
        }
    }

    fn open(
        path: &std::path::Path,
        clock: Arc<TestClock>,
        inbox: Arc<Inbox>,
        adjust: impl FnOnce(&mut SpotwardenConfig),
    ) -> SpotService {
        let mut config = SpotwardenConfig::new(TOKEN, MODERATOR);
        config.store_dir = Some(path.to_path_buf());
        adjust(&mut config);
        let store = Arc::new(SpotStore::open(path).unwrap());
        SpotService::with_components(config, store, inbox, clock).unwrap()
    }

    /// Drop the service and reopen the same store.
    pub fn reopen(self) -> Self {
        let Harness {
            dir,
            clock,
            inbox,
            service,
        } = self;
        drop(service);
        let service = Self::open(dir.path(), clock.clone(), inbox.clone(), |_| {});
        Self {
            dir,
            clock,
            inbox,
            service: Arc::new(service),
        }
    }

    pub fn login(&self, user_id: u64, username: &str) -> Identity {
        let now = self.clock.now_utc().timestamp();
        self.service
            .authenticate(&init_data_for(user_id, username, now))
            .unwrap()
    }

    pub fn moderator(&self) -> Identity {
        self.login(MODERATOR, "mod")
    }

    /// Submit a spot and return its id.
    pub fn submit(&self, author: &Identity, title: &str) -> u64 {
        self.service
            .submit_spot(
                author,
                SpotSubmission {
                    title: title.to_string(),
                    lat: 55.7558,
                    lon: 37.6173,
                    unlock_target: format!("https://telegra.ph/{}", title.replace(' ', "-")),
                    danger: None,
                },
            )
            .unwrap()
            .spot_id
    }

    /// Submit and approve a spot, returning its id.
    pub fn approved_spot(&self, author: &Identity, title: &str) -> u64 {
        let id = self.submit(author, title);
        self.service.approve_spot(MODERATOR, id).unwrap();
        id
    }

    /// Callback data of the moderator button for `spot_id`.
    pub fn button(&self, spot_id: u64, label_prefix: &str) -> String {
        let marker = format!("ID: {}\n", spot_id);
        self.inbox
            .to(MODERATOR)
            .into_iter()
            .find(|n| n.text.contains(&marker))
            .and_then(|n| {
                n.buttons
                    .into_iter()
                    .find(|b| b.label.starts_with(label_prefix))
            })
            .map(|b| b.callback_data)
            .unwrap()
    }
}
