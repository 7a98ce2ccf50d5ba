//! Best-effort dispatch with a persistent retry queue.
//!
//! Only transport failures are queued. Final Bot API rejections and entries
//! that used up their attempts are dropped with a warning.
//!
//! A flush claims each entry in its own write transaction before sending it,
//! so concurrent flushes do not deliver the same entry twice. A claim left
//! behind by a crashed flush expires after [`CLAIM_LEASE_SECS`]; delivery is
//! therefore at-least-once across crashes.

use crate::clock::Clock;
use crate::notify::{Notice, Notifier};
use crate::store::records::OutboxEntry;
use crate::store::SpotStore;
use crate::SpotwardenError;
use chrono::Duration;
use std::sync::Arc;

/// How long a flush may hold an entry before another flush may take it.
pub const CLAIM_LEASE_SECS: i64 = 300;

/// Result of an outbox flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Notices delivered and removed.
    pub delivered: usize,
    /// Notices removed without delivery.
    pub dropped: usize,
    /// Notices that failed again and stay queued.
    pub pending: usize,
}

/// Sends notices, parking retryable failures in the outbox.
pub struct NoticeDispatcher {
    notifier: Arc<dyn Notifier>,
    store: Arc<SpotStore>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl NoticeDispatcher {
    /// Create a dispatcher. `max_attempts` counts the first delivery.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        store: Arc<SpotStore>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            notifier,
            store,
            clock,
            max_attempts,
        }
    }

    /// Try to deliver a notice now; queue it on a retryable failure.
    ///
    /// Returns whether the notice was delivered. Never fails: an outbox write
    /// error is logged and the notice is dropped.
    pub fn dispatch(&self, notice: &Notice) -> bool {
        let error = match self.notifier.send(notice) {
            Ok(()) => return true,
            Err(e) => e,
        };

        if !error.is_retryable_notice() || self.max_attempts <= 1 {
            tracing::warn!(chat_id = notice.chat_id, error = %error, "notice dropped");
            return false;
        }
        tracing::warn!(chat_id = notice.chat_id, error = %error, "notice delivery failed, queued");

        let queued = OutboxEntry::encode(notice).and_then(|payload| {
            let entry = OutboxEntry {
                id: 0,
                payload,
                attempts: 1,
                last_error: error.to_string(),
                enqueued_at: self.clock.now_utc(),
                claimed_until: None,
            };
            self.store.write(|txn| self.store.push_outbox(txn, entry))
        });
        if let Err(e) = queued {
            tracing::warn!(chat_id = notice.chat_id, error = %e, "notice dropped");
        }
        false
    }

    /// Retry every unclaimed queued notice once, oldest first.
    pub fn flush(&self) -> Result<FlushReport, SpotwardenError> {
        let ids: Vec<u64> = self
            .store
            .read(|txn| self.store.outbox_entries(txn))?
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        let mut report = FlushReport::default();

        for id in ids {
            let Some(mut entry) = self.claim(id)? else {
                continue;
            };

            let notice: Notice = match entry.decode() {
                Ok(notice) => notice,
                Err(e) => {
                    tracing::warn!(outbox_id = entry.id, error = %e, "undecodable notice removed");
                    self.store.write(|txn| self.store.remove_outbox(txn, entry.id))?;
                    report.dropped += 1;
                    continue;
                }
            };

            let error = match self.notifier.send(&notice) {
                Ok(()) => {
                    self.store.write(|txn| self.store.remove_outbox(txn, entry.id))?;
                    report.delivered += 1;
                    continue;
                }
                Err(e) => e,
            };

            entry.attempts = entry.attempts.saturating_add(1);
            entry.last_error = error.to_string();
            if !error.is_retryable_notice() || entry.attempts >= self.max_attempts {
                tracing::warn!(
                    outbox_id = entry.id,
                    chat_id = notice.chat_id,
                    attempts = entry.attempts,
                    error = %error,
                    "queued notice dropped"
                );
                self.store.write(|txn| self.store.remove_outbox(txn, entry.id))?;
                report.dropped += 1;
            } else {
                entry.claimed_until = None;
                self.store.write(|txn| self.store.update_outbox(txn, &entry))?;
                report.pending += 1;
            }
        }

        if report != FlushReport::default() {
            tracing::info!(
                delivered = report.delivered,
                dropped = report.dropped,
                pending = report.pending,
                "outbox flushed"
            );
        }
        Ok(report)
    }

    /// Number of queued notices.
    pub fn pending(&self) -> Result<usize, SpotwardenError> {
        Ok(self.store.read(|txn| self.store.outbox_entries(txn))?.len())
    }

    /// Mark an entry as taken by this flush. `None` when it is gone or held
    /// by another flush.
    fn claim(&self, id: u64) -> Result<Option<OutboxEntry>, SpotwardenError> {
        let now = self.clock.now_utc();
        self.store.write(|txn| {
            let Some(mut entry) = self.store.outbox_entry(txn, id)? else {
                return Ok(None);
            };
            if entry.claimed_until.is_some_and(|until| until > now) {
                return Ok(None);
            }
            entry.claimed_until = Some(now + Duration::seconds(CLAIM_LEASE_SECS));
            self.store.update_outbox(txn, &entry)?;
            Ok(Some(entry))
        })
    }
}
