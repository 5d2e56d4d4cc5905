//! Delete-for-everyone path: recover content, journal it, maybe alert.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    revwatch_channels::RevokedSnapshot,
    revwatch_common::RevocationRecord,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use revwatch_metrics::{alerts as alert_metrics, counter, events as event_metrics};

use crate::{Result, error::Context, fault::supervise, service::Watcher};

/// Build the revocation record for `message_id`.
///
/// A cache hit wins and yields a full record. Without one, a snapshot with a
/// text body yields a degraded record. Otherwise nothing can be recovered.
pub fn resolve_revocation(
    cached: Option<&revwatch_common::LogRecord>,
    message_id: &str,
    before: Option<&RevokedSnapshot>,
    deleted_at: DateTime<Utc>,
) -> Option<RevocationRecord> {
    if let Some(record) = cached {
        return Some(RevocationRecord::from_cached(record, deleted_at));
    }

    let snapshot = before.filter(|s| !s.body.is_empty())?;
    let id = snapshot
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(message_id);
    let remote_chat_id = snapshot
        .remote_chat_id
        .clone()
        .filter(|chat| !chat.is_empty());

    Some(RevocationRecord::degraded(
        id,
        snapshot.body.clone(),
        remote_chat_id,
        deleted_at,
    ))
}

impl Watcher {
    /// Record a revoked message and fire the optional public alert.
    ///
    /// The revocation is queued on the journal before the alert is sent, and
    /// the alert runs in the background so a slow send never holds up the
    /// next event.
    pub async fn handle_message_revoked(
        &mut self,
        message_id: String,
        before: Option<RevokedSnapshot>,
    ) -> Result<Option<RevocationRecord>> {
        let message_id = Some(message_id)
            .filter(|id| !id.is_empty())
            .context("revocation without message id")?;

        let deleted_at = Utc::now();
        let Some(record) = resolve_revocation(
            self.cache.get(&message_id),
            &message_id,
            before.as_ref(),
            deleted_at,
        ) else {
            debug!(%message_id, "revoked message not cached and no usable snapshot");
            #[cfg(feature = "metrics")]
            counter!(event_metrics::REVOCATIONS_UNRESOLVED_TOTAL).increment(1);
            return Ok(None);
        };

        self.journal.append_revocation(&record);
        info!(
            message_id = %record.id,
            sender = %record.sender_number,
            degraded = record.is_degraded(),
            "message deleted for everyone"
        );
        #[cfg(feature = "metrics")]
        counter!(
            event_metrics::REVOCATIONS_RECORDED_TOTAL,
            "source" => if record.is_degraded() { "snapshot" } else { "cache" }
        )
        .increment(1);

        self.spawn_alert(&record);
        Ok(Some(record))
    }

    fn spawn_alert(&mut self, record: &RevocationRecord) {
        let Some(text) = self.settings.alert_text.clone() else {
            return;
        };
        let Some(chat) = record.remote_chat_id.clone().filter(|c| !c.is_empty()) else {
            debug!(message_id = %record.id, "no chat to alert for revoked message");
            return;
        };

        let client = Arc::clone(&self.client);
        let message_id = record.id.clone();
        self.alerts.spawn(async move {
            let send = async {
                match client.send_message(&chat, &text).await {
                    Ok(()) => {
                        debug!(%message_id, %chat, "revocation alert sent");
                        #[cfg(feature = "metrics")]
                        counter!(alert_metrics::SENT_TOTAL).increment(1);
                    },
                    Err(e) => {
                        warn!(%message_id, %chat, error = %e, "failed to send revocation alert");
                        #[cfg(feature = "metrics")]
                        counter!(alert_metrics::FAILED_TOTAL).increment(1);
                    },
                }
            };
            if let Err(panic) = supervise(send).await {
                warn!(%message_id, %panic, "revocation alert task panicked");
            }
        });

        // Reap alerts that already finished so the set stays small.
        while self.alerts.try_join_next().is_some() {}
    }
}
