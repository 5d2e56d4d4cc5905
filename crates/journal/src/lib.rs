//! Durable, append-only journal of observed and revoked messages.
//!
//! Two JSONL streams (one record per line) live side by side in the log
//! directory. Each stream has a single writer task, so lines land in the
//! file in the order they were submitted. Nothing is ordered across the two
//! streams.

pub mod error;
pub mod reader;
pub mod writer;

pub use {
    error::{Error, Result},
    reader::read_tail,
    writer::{Journal, StreamKind},
};
