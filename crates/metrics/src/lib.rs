//! Metric names and recorder setup for revwatch.
//!
//! Recording goes through the `metrics` crate facade, which is a no-op until
//! [`init_metrics`] installs a recorder. Consumers gate their recording calls
//! behind their own `metrics` feature.
//!
//! # Features
//!
//! - `prometheus`: install a Prometheus recorder whose values
//!   [`MetricsHandle::render`] returns as text
//!
//! ```rust,ignore
//! use revwatch_metrics::{counter, events};
//!
//! counter!(events::MESSAGES_OBSERVED_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
