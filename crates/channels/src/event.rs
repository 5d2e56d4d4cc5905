use {
    serde::{Deserialize, Serialize},
    tokio::sync::mpsc,
};

// ── Client events ───────────────────────────────────────────────────────────

/// A newly created message as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message id, unique within the chat network.
    pub id: String,
    /// Sender reference including its chat-type suffix (`123@c.us`).
    pub chat_ref: String,
    pub body: String,
    #[serde(default)]
    pub has_media: bool,
    /// Chat to reply into.
    pub remote_chat_id: String,
}

/// What the client still knew about a message right before it was revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub remote_chat_id: Option<String>,
}

/// Events pushed by a [`crate::ChatClient`], delivered one at a time to the
/// watcher loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Pairing code to show the operator. Passed through untouched.
    Qr(String),
    /// The client finished starting up.
    Ready,
    MessageCreated(InboundMessage),
    /// A message was deleted for everyone. `before` is whatever the client
    /// still had about it, if anything.
    MessageRevoked {
        message_id: String,
        before: Option<RevokedSnapshot>,
    },
    /// Authentication was rejected; pairing has to start over.
    AuthFailure(String),
    /// The client lost its session.
    Disconnected(String),
}

impl ClientEvent {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Qr(_) => "qr",
            Self::Ready => "ready",
            Self::MessageCreated(_) => "message_create",
            Self::MessageRevoked { .. } => "message_revoke_everyone",
            Self::AuthFailure(_) => "auth_failure",
            Self::Disconnected(_) => "disconnected",
        }
    }
}

/// Sender handed to the client on initialization.
pub type ClientEventSender = mpsc::UnboundedSender<ClientEvent>;
