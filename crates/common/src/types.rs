//! Records observed from the chat client and written to the journal.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// Sender placeholder for revocations rebuilt from a partial snapshot.
pub const UNKNOWN_SENDER: &str = "Unknown (Not in cache)";

/// Chat-type suffixes appended to sender references by the chat client.
const CHAT_SUFFIXES: &[&str] = &["@c.us", "@g.us"];

/// One observed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    /// When the message was observed, not when it was sent.
    pub timestamp: DateTime<Utc>,
    pub sender_number: String,
    pub chat_name: String,
    pub content: String,
    #[serde(rename = "hasMedia")]
    pub has_media: bool,
    /// Routing token needed to reply into the originating chat.
    pub remote_chat_id: String,
}

impl LogRecord {
    /// Reject records that would break the journal invariants.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::invalid_record("empty message id"));
        }
        if self.content.is_empty() {
            return Err(Error::invalid_record(format!(
                "empty content for message {}",
                self.id
            )));
        }
        Ok(())
    }
}

/// A deleted message, either copied from a cached [`LogRecord`] or degraded
/// from the partial snapshot the client supplied with the deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sender_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,
    pub content: String,
    #[serde(
        default,
        rename = "hasMedia",
        skip_serializing_if = "Option::is_none"
    )]
    pub has_media: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_chat_id: Option<String>,
    /// Not guaranteed to be after `timestamp`; clock skew is left alone.
    pub deleted_at: DateTime<Utc>,
}

impl RevocationRecord {
    /// Full-fidelity revocation built from a cached record.
    #[must_use]
    pub fn from_cached(record: &LogRecord, deleted_at: DateTime<Utc>) -> Self {
        Self {
            id: record.id.clone(),
            timestamp: record.timestamp,
            sender_number: record.sender_number.clone(),
            chat_name: Some(record.chat_name.clone()),
            content: record.content.clone(),
            has_media: Some(record.has_media),
            remote_chat_id: Some(record.remote_chat_id.clone()),
            deleted_at,
        }
    }

    /// Degraded revocation built without a cache hit. The sender is set to
    /// [`UNKNOWN_SENDER`] and the observation time to `deleted_at`.
    #[must_use]
    pub fn degraded(
        id: impl Into<String>,
        content: impl Into<String>,
        remote_chat_id: Option<String>,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: deleted_at,
            sender_number: UNKNOWN_SENDER.to_string(),
            chat_name: None,
            content: content.into(),
            has_media: None,
            remote_chat_id,
            deleted_at,
        }
    }

    /// Whether this record came from the snapshot fallback.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.sender_number == UNKNOWN_SENDER
    }
}

/// Strip chat-type suffixes (`@c.us`, `@g.us`) from a chat reference.
///
/// Every occurrence is removed, so `"123@c.us"` and `"123@g.us"` both map to
/// `"123"`. References without a suffix are returned unchanged.
#[must_use]
pub fn normalize_sender_number(chat_ref: &str) -> String {
    CHAT_SUFFIXES
        .iter()
        .fold(chat_ref.to_string(), |acc, suffix| acc.replace(suffix, ""))
}
