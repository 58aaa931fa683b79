//! Bounded recent-history buffer with ring semantics.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::message::Message;

/// Append-only record of recent relay traffic.
///
/// Holds at most `capacity` entries; appending to a full buffer evicts
/// the oldest entry. Reads and writes share one mutex, so a snapshot
/// observes either the pre- or post-append state, never a partial
/// write. History is process-lifetime only by design.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: Mutex<VecDeque<Message>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a message, evicting the oldest entry when full.
    pub fn append(&self, msg: Message) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(msg);
    }

    /// The most recent `max` messages in chronological order.
    pub fn snapshot(&self, max: usize) -> Vec<Message> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(max);
        entries.iter().skip(skip).cloned().collect()
    }

    /// All messages with `id` greater than `cursor`, in order. Used by
    /// the polling fallback.
    pub fn since(&self, cursor: u64) -> Vec<Message> {
        self.entries
            .lock()
            .iter()
            .filter(|m| m.id > cursor)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
