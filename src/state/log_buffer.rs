//! Bounded in-memory rewrite log

use crate::config::HARD_LOG_CEILING;
use crate::provider::LogEntry;
use std::collections::VecDeque;

/// Ring buffer of log entries
///
/// Once `limit` entries are held, each push evicts the oldest one. The
/// buffer tracks whether it changed since the last [`LogBuffer::take_dirty`]
/// so persistence can be batched.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    limit: usize,
    dirty: bool,
}

impl LogBuffer {
    /// Creates a buffer; the limit is clamped to `1..=HARD_LOG_CEILING`
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, HARD_LOG_CEILING);
        Self {
            entries: VecDeque::with_capacity(limit.min(256)),
            limit,
            dirty: false,
        }
    }

    /// Creates a buffer holding the newest entries of `entries`
    pub fn restore(limit: usize, entries: Vec<LogEntry>) -> Self {
        let mut buffer = Self::new(limit);
        buffer.extend(entries);
        buffer.dirty = false;
        buffer
    }

    pub fn push(&mut self, entry: LogEntry) {
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.dirty = true;
    }

    pub fn extend<I: IntoIterator<Item = LogEntry>>(&mut self, entries: I) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, oldest first
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Returns a snapshot if the buffer changed since the last call
    pub fn take_dirty(&mut self) -> Option<Vec<LogEntry>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.snapshot())
    }
}
