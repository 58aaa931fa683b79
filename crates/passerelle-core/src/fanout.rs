//! Message fan-out to live stream subscribers.
//!
//! Each subscriber owns an isolated bounded queue. Publishing never
//! blocks: when a queue is full the oldest undelivered entry is
//! dropped to admit the newest, so one slow consumer cannot hold back
//! the producers or its peers. Recency wins over completeness here,
//! which is the right trade for a real-time chat display.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::message::Message;

/// Owns the set of live subscribers and pushes published messages into
/// their queues.
#[derive(Debug)]
pub struct Distributor {
    subscribers: Mutex<HashMap<u64, Arc<Slot>>>,
    next_subscriber_id: AtomicU64,
    queue_capacity: usize,
}

/// One live connection's delivery queue.
#[derive(Debug)]
struct Slot {
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
    /// Highest message id preloaded from the registration snapshot.
    /// Live publishes at or below it are skipped, so the snapshot→live
    /// boundary never shows a duplicate.
    last_snapshot_id: u64,
    connected_at: DateTime<Utc>,
}

impl Distributor {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Registers a new subscriber, preloading its queue with the given
    /// history snapshot (chronological).
    ///
    /// Callers must append a message to history before publishing it;
    /// under that ordering every message lands either in the snapshot
    /// or in the live feed, with no gap across the boundary.
    pub fn register(self: &Arc<Self>, snapshot: Vec<Message>) -> SubscriberHandle {
        let last_snapshot_id = snapshot.last().map(|m| m.id).unwrap_or(0);

        let mut queue = VecDeque::with_capacity(self.queue_capacity);
        for msg in snapshot {
            if queue.len() == self.queue_capacity {
                queue.pop_front();
            }
            queue.push_back(msg);
        }

        let slot = Arc::new(Slot {
            queue: Mutex::new(queue),
            notify: Notify::new(),
            last_snapshot_id,
            connected_at: Utc::now(),
        });

        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, slot.clone());
        debug!(subscriber = id, last_snapshot_id, "subscriber registered");

        SubscriberHandle {
            id,
            slot,
            distributor: Arc::clone(self),
        }
    }

    /// Appends `msg` to every registered subscriber's queue, dropping
    /// each full queue's oldest undelivered entry first.
    ///
    /// Holds the registry lock for the duration so concurrent
    /// publishers cannot interleave: every subscriber observes the
    /// same relative order. No await points anywhere on this path.
    pub fn publish(&self, msg: &Message) {
        let subscribers = self.subscribers.lock();
        for (id, slot) in subscribers.iter() {
            if msg.id <= slot.last_snapshot_id {
                continue;
            }

            {
                let mut queue = slot.queue.lock();
                if queue.len() == self.queue_capacity {
                    queue.pop_front();
                    trace!(subscriber = *id, msg_id = msg.id, "queue full, dropped oldest");
                }
                queue.push_back(msg.clone());
            }
            slot.notify.notify_one();
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn unregister(&self, id: u64) {
        if let Some(slot) = self.subscribers.lock().remove(&id) {
            let connected_for = Utc::now() - slot.connected_at;
            debug!(
                subscriber = id,
                connected_secs = connected_for.num_seconds(),
                "subscriber unregistered"
            );
        }
    }
}

/// A registered subscriber's receiving end.
///
/// Dropping the handle unregisters the subscriber, so a disconnecting
/// stream frees its queue as soon as the transport closes.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: u64,
    slot: Arc<Slot>,
    distributor: Arc<Distributor>,
}

impl SubscriberHandle {
    /// Waits for the next queued message, or returns `None` once
    /// `timeout` elapses (the caller's cue to emit a keep-alive).
    pub async fn next_message(&self, timeout: Duration) -> Option<Message> {
        loop {
            // Arm the waiter before checking the queue so a publish
            // between the check and the await is not lost.
            let notified = self.slot.notify.notified();

            if let Some(msg) = self.slot.queue.lock().pop_front() {
                return Some(msg);
            }

            if tokio::time::timeout(timeout, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Messages currently waiting in this subscriber's queue.
    pub fn queued(&self) -> usize {
        self.slot.queue.lock().len()
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.distributor.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Source;

    fn msg(id: u64, text: &str) -> Message {
        Message {
            id,
            source: Source::Platform,
            text: text.into(),
            timestamp: Utc::now(),
            external_ref: None,
        }
    }

    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_delivers_in_publish_order() {
        let dist = Arc::new(Distributor::new(16));
        let sub = dist.register(Vec::new());

        for id in 1..=3 {
            dist.publish(&msg(id, "m"));
        }

        for expected in 1..=3 {
            let got = sub.next_message(SHORT).await.unwrap();
            assert_eq!(got.id, expected);
        }
        assert!(sub.next_message(SHORT).await.is_none());
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let dist = Arc::new(Distributor::new(2));
        let sub = dist.register(Vec::new());

        for id in 1..=4 {
            dist.publish(&msg(id, "m"));
        }

        // Queue capacity 2, four publishes, no consumption: the
        // subscriber observes exactly the last two.
        assert_eq!(sub.queued(), 2);
        assert_eq!(sub.next_message(SHORT).await.unwrap().id, 3);
        assert_eq!(sub.next_message(SHORT).await.unwrap().id, 4);
        assert!(sub.next_message(SHORT).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_then_live_without_gap_or_duplicate() {
        let dist = Arc::new(Distributor::new(16));
        let snapshot = vec![msg(1, "a"), msg(2, "b")];
        let sub = dist.register(snapshot);

        // A publish racing the registration may replay a snapshot
        // message; the handle must not see it twice.
        dist.publish(&msg(2, "b"));
        dist.publish(&msg(3, "c"));

        let ids: Vec<u64> = [
            sub.next_message(SHORT).await.unwrap().id,
            sub.next_message(SHORT).await.unwrap().id,
            sub.next_message(SHORT).await.unwrap().id,
        ]
        .into();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(sub.next_message(SHORT).await.is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_affect_others() {
        let dist = Arc::new(Distributor::new(2));
        let slow = dist.register(Vec::new());
        let fast = dist.register(Vec::new());

        for id in 1..=5 {
            dist.publish(&msg(id, "m"));
            // Fast consumer keeps draining.
            assert_eq!(fast.next_message(SHORT).await.unwrap().id, id);
        }

        // Slow consumer kept only the most recent two.
        assert_eq!(slow.next_message(SHORT).await.unwrap().id, 4);
        assert_eq!(slow.next_message(SHORT).await.unwrap().id, 5);
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let dist = Arc::new(Distributor::new(4));
        let sub = dist.register(Vec::new());
        assert_eq!(dist.subscriber_count(), 1);

        drop(sub);
        assert_eq!(dist.subscriber_count(), 0);

        // Publishing with no subscribers is a no-op.
        dist.publish(&msg(1, "m"));
    }

    #[tokio::test]
    async fn test_next_message_times_out_when_idle() {
        let dist = Arc::new(Distributor::new(4));
        let sub = dist.register(Vec::new());

        let start = std::time::Instant::now();
        assert!(sub.next_message(Duration::from_millis(30)).await.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_wakes_waiting_subscriber() {
        let dist = Arc::new(Distributor::new(4));
        let sub = dist.register(Vec::new());

        let publisher = {
            let dist = dist.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                dist.publish(&msg(1, "late"));
            })
        };

        let got = sub.next_message(Duration::from_secs(2)).await.unwrap();
        assert_eq!(got.text, "late");
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_preload_respects_queue_capacity() {
        let dist = Arc::new(Distributor::new(2));
        let snapshot = vec![msg(1, "a"), msg(2, "b"), msg(3, "c")];
        let sub = dist.register(snapshot);

        // Only the most recent two snapshot entries fit.
        assert_eq!(sub.next_message(SHORT).await.unwrap().id, 2);
        assert_eq!(sub.next_message(SHORT).await.unwrap().id, 3);
        assert!(sub.next_message(SHORT).await.is_none());
    }
}
