//! Chat client collaborator interface.
//!
//! The watcher never speaks a chat protocol itself. A client implementation
//! (WhatsApp Web via sidecar, or a fake in tests) implements [`ChatClient`]
//! and pushes [`ClientEvent`]s into the sender it is handed on
//! initialization.

pub mod client;
pub mod error;
pub mod event;

pub use {
    client::ChatClient,
    error::{Error, Result},
    event::{ClientEvent, ClientEventSender, InboundMessage, RevokedSnapshot},
};
