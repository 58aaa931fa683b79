//! Suppression of repeated webhook deliveries.
//!
//! The platform delivers updates at least once; retries typically
//! arrive within seconds of the original. A bounded seen-set is enough
//! to absorb that window without growing forever.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tracing::trace;

/// Tracks recently processed external update identifiers.
///
/// Membership checks are O(1); once the set reaches its capacity the
/// oldest entries are evicted first.
#[derive(Debug)]
pub struct Deduplicator {
    inner: Mutex<DedupState>,
    capacity: usize,
}

#[derive(Debug)]
struct DedupState {
    seen: HashSet<i64>,
    order: VecDeque<i64>,
}

impl Deduplicator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(DedupState {
                seen: HashSet::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Returns `true` if `external_id` has not been seen before and
    /// records it; `false` on a repeat, in which case the caller must
    /// treat the delivery as a no-op.
    pub fn check_and_mark(&self, external_id: i64) -> bool {
        let mut state = self.inner.lock();

        if state.seen.contains(&external_id) {
            trace!(external_id, "duplicate update id");
            return false;
        }

        if state.order.len() == self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.seen.remove(&oldest);
            }
        }

        state.seen.insert(external_id);
        state.order.push_back(external_id);
        true
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_then_duplicate() {
        let dedup = Deduplicator::new(16);
        assert!(dedup.check_and_mark(42));
        assert!(!dedup.check_and_mark(42));
        assert!(dedup.check_and_mark(43));
    }

    #[test]
    fn test_bounded_growth() {
        let dedup = Deduplicator::new(8);
        for id in 0..100 {
            assert!(dedup.check_and_mark(id));
        }
        assert_eq!(dedup.len(), 8);
    }

    #[test]
    fn test_fifo_eviction_forgets_oldest_first() {
        let dedup = Deduplicator::new(2);
        assert!(dedup.check_and_mark(1));
        assert!(dedup.check_and_mark(2));
        // Inserting a third evicts id 1, which then looks new again.
        assert!(dedup.check_and_mark(3));
        assert!(dedup.check_and_mark(1));
        // Id 3 is still within the window.
        assert!(!dedup.check_and_mark(3));
    }
}
