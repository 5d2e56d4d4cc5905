//! Deleted-message watcher: caches every text message the chat client
//! reports, and when one is deleted for everyone writes what it said to the
//! revocation journal and optionally replies in the chat.

pub mod cache;
pub mod error;
pub mod fault;
pub mod lifecycle;
pub mod processor;
pub mod revocation;
pub mod service;
pub mod signal;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing;

pub use {
    cache::MessageCache,
    error::{Error, Result},
    lifecycle::{
        CachePersistence, LifecycleController, LifecycleState, NoopPersistence, ShutdownHandle,
        ShutdownReason,
    },
    service::{Dispatch, WatchSettings, Watcher},
    signal::{install_panic_hook, spawn_signal_listener, wait_for_signal},
};
