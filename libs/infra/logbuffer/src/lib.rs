//! Bounded, thread-safe circular buffer of recent log entries, queryable
//! by timestamp for remote retrieval (spec component C4).

pub mod layer;

pub use layer::RingLogLayer;

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_CAPACITY: usize = 1000;
const MESSAGE_BYTE_LIMIT: usize = 2048;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: Option<String>,
}

impl LogEntry {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.into(),
            message: truncate(message.into()),
            file: None,
            line: None,
            function: None,
        }
    }

    pub fn with_location(mut self, file: &str, line: u32, function: &str) -> Self {
        self.file = Some(file.to_string());
        self.line = Some(line);
        self.function = Some(function.to_string());
        self
    }
}

fn truncate(message: String) -> String {
    if message.len() <= MESSAGE_BYTE_LIMIT {
        return message;
    }
    let mut cut = MESSAGE_BYTE_LIMIT;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = message[..cut].to_string();
    truncated.push('\u{2026}');
    truncated
}

/// FIFO-on-overflow ring buffer. `Add` is O(1); `GetSince` is O(n) over the
/// retained window, which at the default 1000-entry capacity is cheap.
pub struct RingLogBuffer {
    capacity: usize,
    entries: RwLock<VecDeque<LogEntry>>,
}

impl Default for RingLogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RingLogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn add(&self, entry: LogEntry) {
        let mut entries = self.entries.write().expect("log buffer lock poisoned");
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn get_since(&self, since: DateTime<Utc>) -> Vec<LogEntry> {
        let entries = self.entries.read().expect("log buffer lock poisoned");
        entries
            .iter()
            .filter(|entry| entry.timestamp > since)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("log buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn overflow_drops_oldest_entry() {
        let buffer = RingLogBuffer::new(2);
        buffer.add(LogEntry::new("info", "first"));
        buffer.add(LogEntry::new("info", "second"));
        buffer.add(LogEntry::new("info", "third"));

        let since = Utc::now() - Duration::hours(1);
        let entries = buffer.get_since(since);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "third");
    }

    #[test]
    fn get_since_excludes_entries_at_or_before_cutoff() {
        let buffer = RingLogBuffer::new(10);
        buffer.add(LogEntry::new("info", "old"));
        let cutoff = Utc::now();
        buffer.add(LogEntry::new("info", "new"));

        let entries = buffer.get_since(cutoff);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "new");
    }

    #[test]
    fn long_message_is_truncated_with_ellipsis() {
        let long = "x".repeat(MESSAGE_BYTE_LIMIT + 500);
        let entry = LogEntry::new("warn", long);
        assert!(entry.message.len() <= MESSAGE_BYTE_LIMIT + '\u{2026}'.len_utf8());
        assert!(entry.message.ends_with('\u{2026}'));
    }
}
