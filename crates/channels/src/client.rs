use async_trait::async_trait;

use crate::{ClientEventSender, Result};

/// The external chat client.
///
/// Implementations own the protocol, authentication, and any browser or
/// sidecar process. The watcher only starts and stops the client, asks it
/// for chat names, and sends the occasional alert.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Client identifier (e.g. "whatsapp-web").
    fn id(&self) -> &str;

    /// Start the client. Events (including the eventual [`Ready`]) are pushed
    /// into `events` until [`destroy`](Self::destroy) is called.
    ///
    /// [`Ready`]: crate::ClientEvent::Ready
    async fn initialize(&self, events: ClientEventSender) -> Result<()>;

    /// Human label for a chat, or `None` if the chat has no name.
    async fn resolve_chat_name(&self, chat_ref: &str) -> Result<Option<String>>;

    /// Send a text message into a chat.
    async fn send_message(&self, remote_chat_id: &str, text: &str) -> Result<()>;

    /// Shut the client down. Calling it twice must be harmless.
    async fn destroy(&self) -> Result<()>;
}
