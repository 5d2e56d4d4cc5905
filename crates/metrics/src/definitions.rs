//! Metric name definitions.
//!
//! Every metric revwatch records is named here so the full set can be read
//! in one place.

/// Inbound event handling
pub mod events {
    /// Messages with a body that were cached
    pub const MESSAGES_OBSERVED_TOTAL: &str = "revwatch_messages_observed_total";
    /// Messages dropped for having an empty body
    pub const MESSAGES_SKIPPED_TOTAL: &str = "revwatch_messages_skipped_total";
    /// Revocations written to the journal, labelled by `source` (cache/snapshot)
    pub const REVOCATIONS_RECORDED_TOTAL: &str = "revwatch_revocations_recorded_total";
    /// Revocations with neither a cache entry nor a snapshot
    pub const REVOCATIONS_UNRESOLVED_TOTAL: &str = "revwatch_revocations_unresolved_total";
    /// Events whose handler returned an error or panicked, labelled by `event`
    /// and `kind` (error/panic)
    pub const FAULTS_TOTAL: &str = "revwatch_event_faults_total";
}

/// Recent-message cache
pub mod cache {
    /// Current number of cached messages
    pub const SIZE: &str = "revwatch_cache_size";
    /// Entries removed by high-water eviction
    pub const EVICTED_TOTAL: &str = "revwatch_cache_evicted_total";
}

/// Durable journal, labelled by `stream` (history/revocations)
pub mod journal {
    /// Lines appended successfully
    pub const LINES_WRITTEN_TOTAL: &str = "revwatch_journal_lines_written_total";
    /// Lines dropped after a serialization or I/O failure
    pub const WRITE_FAILURES_TOTAL: &str = "revwatch_journal_write_failures_total";
}

/// In-chat deletion alerts
pub mod alerts {
    /// Alerts delivered to the chat client
    pub const SENT_TOTAL: &str = "revwatch_alerts_sent_total";
    /// Alerts the chat client failed to send
    pub const FAILED_TOTAL: &str = "revwatch_alerts_failed_total";
}
