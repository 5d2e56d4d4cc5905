//! Bounded, insertion-ordered cache of recently observed messages.
//!
//! The cache only exists to recover the content of messages that are later
//! revoked. It is never authoritative: once an entry is evicted its content
//! is gone unless the history stream was enabled.

use std::collections::{HashMap, VecDeque};

use revwatch_common::LogRecord;

#[cfg(feature = "metrics")]
use revwatch_metrics::{cache as cache_metrics, counter, gauge};

/// Entry count above which an eviction runs.
pub const DEFAULT_HIGH_WATER: usize = 5000;

/// Number of oldest entries removed per eviction.
pub const DEFAULT_EVICT_BATCH: usize = 1000;

/// Message id → last known record, with FIFO high-water eviction.
///
/// Eviction order is insertion order, not access order: reading an entry
/// does not protect it. Overwriting an id keeps its original position.
#[derive(Debug)]
pub struct MessageCache {
    entries: HashMap<String, LogRecord>,
    order: VecDeque<String>,
    high_water: usize,
    evict_batch: usize,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCache {
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_HIGH_WATER, DEFAULT_EVICT_BATCH)
    }

    /// Cache that evicts `evict_batch` entries whenever it holds more than
    /// `high_water`. A batch of 0 is raised to 1 so the bound always holds.
    pub fn with_bounds(high_water: usize, evict_batch: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            high_water,
            evict_batch: evict_batch.max(1),
        }
    }

    /// Insert or overwrite the record under its id. Returns how many entries
    /// were evicted as a result.
    pub fn put(&mut self, record: LogRecord) -> usize {
        let id = record.id.clone();
        if self.entries.insert(id.clone(), record).is_none() {
            self.order.push_back(id);
        }

        let evicted = if self.entries.len() > self.high_water {
            self.evict_oldest()
        } else {
            0
        };

        #[cfg(feature = "metrics")]
        gauge!(cache_metrics::SIZE).set(self.entries.len() as f64);

        evicted
    }

    /// Look up a record. Evicted and never-seen ids are both `None`.
    pub fn get(&self, id: &str) -> Option<&LogRecord> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records from oldest to newest insertion.
    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    fn evict_oldest(&mut self) -> usize {
        let mut evicted = 0;
        while evicted < self.evict_batch {
            let Some(id) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&id).is_some() {
                evicted += 1;
            }
        }

        tracing::debug!(
            evicted,
            remaining = self.entries.len(),
            "message cache over high-water mark, evicted oldest entries"
        );
        #[cfg(feature = "metrics")]
        counter!(cache_metrics::EVICTED_TOTAL).increment(evicted as u64);

        evicted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, chrono::Utc};

    fn record(id: &str, content: &str) -> LogRecord {
        LogRecord {
            id: id.into(),
            timestamp: Utc::now(),
            sender_number: "15551234567".into(),
            chat_name: "15551234567".into(),
            content: content.into(),
            has_media: false,
            remote_chat_id: "15551234567@c.us".into(),
        }
    }

    #[test]
    fn get_returns_inserted_record() {
        let mut cache = MessageCache::new();
        cache.put(record("A1", "hello"));
        assert_eq!(cache.get("A1").map(|r| r.content.as_str()), Some("hello"));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn overwrite_replaces_content_without_growing() {
        let mut cache = MessageCache::new();
        cache.put(record("A1", "first"));
        cache.put(record("A1", "second"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("A1").unwrap().content, "second");
    }

    #[test]
    fn six_thousand_inserts_settle_at_five_thousand() {
        let mut cache = MessageCache::new();
        let mut evictions = Vec::new();
        for i in 0..6000 {
            let evicted = cache.put(record(&format!("m{i}"), "x"));
            if evicted > 0 {
                evictions.push((i, evicted));
            }
            assert!(cache.len() <= DEFAULT_HIGH_WATER);
        }

        // The 5001st insert trips the mark once.
        assert_eq!(evictions, vec![(5000, 1000)]);
        assert_eq!(cache.len(), 5000);
        for i in 0..1000 {
            assert!(cache.get(&format!("m{i}")).is_none(), "m{i} should be evicted");
        }
        assert!(cache.get("m1000").is_some());
        assert!(cache.get("m5999").is_some());
    }

    #[test]
    fn eviction_is_fifo_not_lru() {
        let mut cache = MessageCache::with_bounds(3, 2);
        cache.put(record("a", "1"));
        cache.put(record("b", "2"));
        cache.put(record("c", "3"));

        // Reading "a" does not protect it.
        assert!(cache.get("a").is_some());
        assert_eq!(cache.put(record("d", "4")), 2);

        assert!(!cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn overwrite_keeps_original_eviction_position() {
        let mut cache = MessageCache::with_bounds(2, 1);
        cache.put(record("a", "1"));
        cache.put(record("b", "2"));
        cache.put(record("a", "updated"));
        cache.put(record("c", "3"));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn zero_batch_still_bounds_size() {
        let mut cache = MessageCache::with_bounds(2, 0);
        for i in 0..10 {
            cache.put(record(&format!("m{i}"), "x"));
            assert!(cache.len() <= 2);
        }
    }

    #[test]
    fn iter_walks_insertion_order() {
        let mut cache = MessageCache::new();
        for id in ["x", "y", "z"] {
            cache.put(record(id, "body"));
        }
        let ids: Vec<&str> = cache.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["x", "y", "z"]);
    }
}
