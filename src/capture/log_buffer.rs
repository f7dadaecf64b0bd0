//! Bounded history of recent console output.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::clock;

/// Maximum entries held before a batch eviction.
pub const DEFAULT_CAPACITY: usize = 100;

/// Entries dropped at once when the buffer is full.
pub const DEFAULT_EVICT_BATCH: usize = 25;

/// Entries returned by [`LogRingBuffer::excerpt`].
pub const DEFAULT_EXCERPT_LEN: usize = 50;

/// Where a log entry was captured from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// Combined stdout/stderr of the test process.
    Console,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Level implied by a leading marker such as `WARNING:` or `[error]`.
    pub fn sniff(message: &str) -> Option<Self> {
        let head: String = message
            .trim_start_matches(|c: char| c == '[' || c.is_whitespace())
            .chars()
            .take(7)
            .collect::<String>()
            .to_ascii_uppercase();
        if head.starts_with("ERROR") {
            Some(Self::Error)
        } else if head.starts_with("WARN") {
            Some(Self::Warning)
        } else if head.starts_with("INFO") {
            Some(Self::Info)
        } else if head.starts_with("DEBUG") {
            Some(Self::Debug)
        } else {
            None
        }
    }
}

/// One captured write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Epoch seconds, e.g. `1700000000.123`.
    pub timestamp: String,
    pub message: String,
    #[serde(rename = "type")]
    pub source: LogSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
}

impl LogEntry {
    /// Stamp `message` with the current time, trimming surrounding whitespace.
    pub fn now(source: LogSource, message: &str) -> Self {
        Self::with_timestamp(clock::epoch_seconds_text(), source, message)
    }

    pub fn with_timestamp(timestamp: String, source: LogSource, message: &str) -> Self {
        let message = message.trim().to_string();
        let level = LogLevel::sniff(&message);
        Self {
            timestamp,
            message,
            source,
            level,
        }
    }
}

/// Thread-safe bounded log history.
///
/// When the buffer is at capacity, the oldest `evict_batch` entries are
/// dropped together before the next append, so the buffer always keeps a
/// contiguous chunk of the most recent history.
#[derive(Debug)]
pub struct LogRingBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    evict_batch: usize,
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_EVICT_BATCH)
    }

    /// Buffer holding at most `capacity` entries, evicting `evict_batch` at a
    /// time. Both are clamped to at least 1 and the batch to the capacity.
    pub fn with_capacity(capacity: usize, evict_batch: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            evict_batch: evict_batch.clamp(1, capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting a batch first if the buffer is full.
    pub fn record(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.drain(..self.evict_batch);
        }
        entries.push_back(entry);
    }

    /// Convenience for [`record`](Self::record) with a fresh timestamp.
    pub fn record_line(&self, source: LogSource, line: &str) {
        self.record(LogEntry::now(source, line));
    }

    /// The most recent `min(n, len)` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// The default-sized excerpt attached to reports.
    pub fn excerpt(&self) -> Vec<LogEntry> {
        self.recent(DEFAULT_EXCERPT_LEN)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(i: usize) -> LogEntry {
        LogEntry::with_timestamp(i.to_string(), LogSource::Console, &format!("line {i}"))
    }

    fn fill(buffer: &LogRingBuffer, count: usize) {
        for i in 0..count {
            buffer.record(entry(i));
        }
    }

    #[test]
    fn message_is_trimmed_and_level_sniffed() {
        let e = LogEntry::now(LogSource::Console, "  WARNING: low memory\n\n");
        assert_eq!(e.message, "WARNING: low memory");
        assert_eq!(e.level, Some(LogLevel::Warning));

        let e = LogEntry::now(LogSource::Console, "[error] boom");
        assert_eq!(e.level, Some(LogLevel::Error));

        let e = LogEntry::now(LogSource::Console, "tapping login button");
        assert_eq!(e.level, None);
    }

    #[test]
    fn hundred_and_first_entry_evicts_oldest_batch() {
        let buffer = LogRingBuffer::new();
        fill(&buffer, 100);
        assert_eq!(buffer.len(), 100);

        buffer.record(entry(100));
        assert_eq!(buffer.len(), 76);

        let all = buffer.recent(usize::MAX);
        assert_eq!(all.first().unwrap().timestamp, "25");
        assert_eq!(all.last().unwrap().timestamp, "100");

        buffer.record(entry(101));
        assert_eq!(buffer.len(), 77);
    }

    #[test]
    fn recent_returns_tail_in_order_without_mutating() {
        let buffer = LogRingBuffer::new();
        fill(&buffer, 10);

        let tail = buffer.recent(3);
        let stamps: Vec<_> = tail.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["7", "8", "9"]);
        assert_eq!(buffer.len(), 10);

        assert_eq!(buffer.recent(50).len(), 10);
        assert!(buffer.recent(0).is_empty());
    }

    #[test]
    fn excerpt_defaults_to_fifty() {
        let buffer = LogRingBuffer::new();
        fill(&buffer, 80);
        let excerpt = buffer.excerpt();
        assert_eq!(excerpt.len(), 50);
        assert_eq!(excerpt[0].timestamp, "30");
    }

    #[test]
    fn entry_serializes_type_tag() {
        let value = serde_json::to_value(entry(1)).unwrap();
        assert_eq!(value["type"], "console");
        assert_eq!(value["message"], "line 1");
        assert!(value.get("level").is_none());
    }

    #[test]
    fn concurrent_writers_never_exceed_capacity() {
        let buffer = std::sync::Arc::new(LogRingBuffer::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        buffer.record(entry(t * 1000 + i));
                        assert!(buffer.len() <= 100);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(buffer.len() <= 100);
    }

    proptest! {
        #[test]
        fn recent_is_bounded_and_chronological(count in 0usize..400, n in 0usize..150) {
            let buffer = LogRingBuffer::new();
            fill(&buffer, count);

            let recent = buffer.recent(n);
            prop_assert!(recent.len() <= n.min(100));
            prop_assert!(buffer.len() <= 100);

            let stamps: Vec<usize> = recent.iter().map(|e| e.timestamp.parse().unwrap()).collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] + 1 == w[1]));
            if let Some(last) = stamps.last() {
                prop_assert_eq!(*last, count - 1);
            }
        }
    }
}
