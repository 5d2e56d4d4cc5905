//! New-message path: normalize, resolve the chat label, cache, journal.

use std::time::Duration;

use {
    chrono::Utc,
    revwatch_channels::{ChatClient, InboundMessage},
    revwatch_common::{LogRecord, normalize_sender_number},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use revwatch_metrics::{counter, events as event_metrics};

use crate::{Result, service::Watcher};

/// Resolve the human label of a chat, falling back to `fallback` when the
/// lookup fails, times out, or the chat has no name.
pub async fn resolve_chat_name(
    client: &dyn ChatClient,
    chat_ref: &str,
    fallback: &str,
    timeout: Duration,
) -> String {
    match tokio::time::timeout(timeout, client.resolve_chat_name(chat_ref)).await {
        Ok(Ok(Some(name))) if !name.trim().is_empty() => name,
        Ok(Ok(_)) => fallback.to_string(),
        Ok(Err(e)) => {
            debug!(chat_ref, error = %e, "chat name lookup failed, using sender number");
            fallback.to_string()
        },
        Err(_) => {
            warn!(
                chat_ref,
                timeout_ms = timeout.as_millis() as u64,
                "chat name lookup timed out, using sender number"
            );
            fallback.to_string()
        },
    }
}

impl Watcher {
    /// Record a newly created message.
    ///
    /// Messages with an empty body (media without caption, system notices)
    /// are skipped and yield `Ok(None)`. Otherwise the record is cached and,
    /// when the strategy asks for it, appended to the history stream.
    pub async fn handle_message_created(
        &mut self,
        message: InboundMessage,
    ) -> Result<Option<LogRecord>> {
        if message.body.is_empty() {
            debug!(message_id = %message.id, "skipping message without text body");
            #[cfg(feature = "metrics")]
            counter!(event_metrics::MESSAGES_SKIPPED_TOTAL).increment(1);
            return Ok(None);
        }

        let sender_number = normalize_sender_number(&message.chat_ref);
        let chat_name = resolve_chat_name(
            self.client.as_ref(),
            &message.chat_ref,
            &sender_number,
            self.settings.chat_name_timeout,
        )
        .await;

        let record = LogRecord {
            id: message.id,
            timestamp: Utc::now(),
            sender_number,
            chat_name,
            content: message.body,
            has_media: message.has_media,
            remote_chat_id: message.remote_chat_id,
        };
        record.validate()?;

        self.cache.put(record.clone());
        if self.settings.strategy.logs_history() {
            self.journal.append_history(&record);
        }

        #[cfg(feature = "metrics")]
        counter!(event_metrics::MESSAGES_OBSERVED_TOTAL).increment(1);
        debug!(message_id = %record.id, chat = %record.chat_name, "message observed");

        Ok(Some(record))
    }
}
