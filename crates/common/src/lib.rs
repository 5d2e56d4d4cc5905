//! Shared record types, error definitions, and helpers used across all
//! revwatch crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{LogRecord, RevocationRecord, UNKNOWN_SENDER, normalize_sender_number},
};
