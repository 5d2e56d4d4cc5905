//! In-memory [`ChatClient`] for exercising the watcher without a browser.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    revwatch_channels::{ChatClient, ClientEvent, ClientEventSender, Error, InboundMessage, Result},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupMode {
    #[default]
    Answer,
    Fail,
    Hang,
    Panic,
}

#[derive(Default)]
pub struct FakeChatClient {
    names: Mutex<HashMap<String, String>>,
    pub lookup: Mutex<LookupMode>,
    pub send_fails: AtomicBool,
    pub init_fails: AtomicBool,
    pub destroy_hangs: AtomicBool,
    /// Events pushed as soon as `initialize` is called.
    script: Mutex<Vec<ClientEvent>>,
    events: Mutex<Option<ClientEventSender>>,
    sent: Mutex<Vec<(String, String)>>,
    pub destroyed: AtomicUsize,
}

impl FakeChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(self, chat_ref: &str, name: &str) -> Self {
        self.names
            .lock()
            .unwrap()
            .insert(chat_ref.into(), name.into());
        self
    }

    pub fn with_lookup(self, mode: LookupMode) -> Self {
        *self.lookup.lock().unwrap() = mode;
        self
    }

    pub fn with_script(self, events: Vec<ClientEvent>) -> Self {
        *self.script.lock().unwrap() = events;
        self
    }

    /// Push an event as if it came from the network.
    pub fn emit(&self, event: ClientEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Drop the event sender, ending the watcher loop once it drains.
    pub fn hang_up(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

pub fn message(id: &str, chat_ref: &str, body: &str) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        chat_ref: chat_ref.into(),
        body: body.into(),
        has_media: false,
        remote_chat_id: chat_ref.into(),
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    fn id(&self) -> &str {
        "fake"
    }

    async fn initialize(&self, events: ClientEventSender) -> Result<()> {
        if self.init_fails.load(Ordering::SeqCst) {
            return Err(Error::unavailable("browser failed to launch"));
        }
        for event in self.script.lock().unwrap().drain(..) {
            let _ = events.send(event);
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn resolve_chat_name(&self, chat_ref: &str) -> Result<Option<String>> {
        let mode = *self.lookup.lock().unwrap();
        match mode {
            LookupMode::Answer => Ok(self.names.lock().unwrap().get(chat_ref).cloned()),
            LookupMode::Fail => Err(Error::rejected("get_chat", "chat not found")),
            LookupMode::Hang => std::future::pending().await,
            LookupMode::Panic => panic!("chat store corrupted"),
        }
    }

    async fn send_message(&self, remote_chat_id: &str, text: &str) -> Result<()> {
        if self.send_fails.load(Ordering::SeqCst) {
            return Err(Error::rejected("send_message", "not allowed"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((remote_chat_id.into(), text.into()));
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.hang_up();
        if self.destroy_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
