//! Relay orchestration.
//!
//! Every inbound item moves through the same stages: dedup (platform
//! side only) → record into history → fan out to subscribers → for the
//! outbound direction, one dispatch attempt toward the gateway. There
//! is no retry stage and no rollback: a message a subscriber has
//! already seen echoed stays visible whatever the gateway does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dedup::Deduplicator;
use crate::fanout::{Distributor, SubscriberHandle};
use crate::gateway::{Gateway, GatewayError};
use crate::history::HistoryBuffer;
use crate::message::{Message, Source};

/// Capacities for the relay's bounded structures.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub history_capacity: usize,
    pub subscriber_queue_capacity: usize,
    pub dedup_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_capacity: 200,
            subscriber_queue_capacity: 128,
            dedup_capacity: 1024,
        }
    }
}

/// Result of an outbound send: the locally recorded message plus the
/// outcome of the single gateway attempt.
#[derive(Debug)]
pub struct OutboundReceipt {
    pub message: Message,
    pub delivered: bool,
    pub detail: Option<String>,
}

/// The relay core. Single writer of history and dedup state; shared
/// across request handlers behind an `Arc`.
pub struct Relay {
    history: HistoryBuffer,
    dedup: Deduplicator,
    distributor: Arc<Distributor>,
    gateway: Arc<dyn Gateway>,
    next_id: AtomicU64,
    /// Serializes id assignment, history append and fanout publish so
    /// the buffer and every subscriber agree on one global order.
    /// Never held across an await.
    ingest: Mutex<()>,
}

impl Relay {
    pub fn new(config: RelayConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            history: HistoryBuffer::new(config.history_capacity),
            dedup: Deduplicator::new(config.dedup_capacity),
            distributor: Arc::new(Distributor::new(config.subscriber_queue_capacity)),
            gateway,
            next_id: AtomicU64::new(1),
            ingest: Mutex::new(()),
        }
    }

    /// Assigns the next id, records the message and fans it out.
    fn record(&self, source: Source, text: String, external_ref: Option<String>) -> Message {
        let _ordered = self.ingest.lock();

        let msg = Message {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            source,
            text,
            timestamp: Utc::now(),
            external_ref,
        };
        self.history.append(msg.clone());
        self.distributor.publish(&msg);
        msg
    }

    /// Ingests one platform webhook event. Returns the recorded
    /// message, or `None` when `update_id` was already processed (the
    /// caller acknowledges the delivery either way).
    pub fn ingest_platform(
        &self,
        update_id: i64,
        text: impl Into<String>,
        external_ref: Option<String>,
    ) -> Option<Message> {
        if !self.dedup.check_and_mark(update_id) {
            debug!(update_id, "duplicate platform delivery skipped");
            return None;
        }

        let msg = self.record(Source::Platform, text.into(), external_ref);
        debug!(id = msg.id, update_id, "platform message recorded");
        Some(msg)
    }

    /// Records and distributes an outbound message locally, then makes
    /// one dispatch attempt toward the gateway.
    ///
    /// `source` is [`Source::Web`] for widget sends and
    /// [`Source::System`] for relay-generated replies. The local echo
    /// always happens first and survives any dispatch outcome.
    pub async fn send_outbound(
        &self,
        source: Source,
        text: impl Into<String>,
        target: Option<&str>,
    ) -> OutboundReceipt {
        let text = text.into();
        let message = self.record(source, text.clone(), target.map(str::to_string));

        let outcome = match target {
            Some(target) => self.gateway.send(target, &text).await,
            None => Err(GatewayError::NotConfigured),
        };

        match outcome {
            Ok(()) => {
                debug!(id = message.id, "message dispatched to gateway");
                OutboundReceipt {
                    message,
                    delivered: true,
                    detail: None,
                }
            }
            Err(e) => {
                warn!(
                    id = message.id,
                    error = %e,
                    "gateway dispatch failed, message stays recorded locally"
                );
                OutboundReceipt {
                    message,
                    delivered: false,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    /// Registers a live subscriber preloaded with the current history
    /// snapshot.
    pub fn subscribe(&self) -> SubscriberHandle {
        // Serialized against `record`: a message landing between the
        // snapshot and the registration would be neither replayed nor
        // delivered live.
        let _ordered = self.ingest.lock();
        self.distributor
            .register(self.history.snapshot(self.history.capacity()))
    }

    /// Polling view: all recorded messages with `id > cursor`.
    pub fn messages_since(&self, cursor: u64) -> Vec<Message> {
        self.history.since(cursor)
    }

    /// Live subscribers currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.distributor.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct RecordingGateway {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Gateway for RecordingGateway {
        async fn send(&self, target: &str, text: &str) -> Result<(), GatewayError> {
            self.calls.lock().push((target.into(), text.into()));
            Ok(())
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl Gateway for FailingGateway {
        async fn send(&self, _target: &str, _text: &str) -> Result<(), GatewayError> {
            Err(GatewayError::Http("connection refused".into()))
        }
    }

    fn relay_with(gateway: Arc<dyn Gateway>) -> Relay {
        Relay::new(RelayConfig::default(), gateway)
    }

    #[tokio::test]
    async fn test_duplicate_update_recorded_once() {
        let relay = relay_with(RecordingGateway::new());

        assert!(relay
            .ingest_platform(42, "hello", Some("chat-1".into()))
            .is_some());
        assert!(relay.ingest_platform(42, "hello", Some("chat-1".into())).is_none());

        let recorded = relay.messages_since(0);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].source, Source::Platform);
        assert_eq!(recorded[0].external_ref.as_deref(), Some("chat-1"));
    }

    #[tokio::test]
    async fn test_local_echo_survives_dispatch_failure() {
        let relay = relay_with(Arc::new(FailingGateway));

        let receipt = relay
            .send_outbound(Source::Web, "hi", Some("chat-1"))
            .await;
        assert!(!receipt.delivered);
        assert!(receipt.detail.unwrap().contains("connection refused"));

        let recorded = relay.messages_since(0);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].text, "hi");
        assert_eq!(recorded[0].source, Source::Web);
    }

    #[tokio::test]
    async fn test_outbound_dispatches_to_target() {
        let gateway = RecordingGateway::new();
        let relay = relay_with(gateway.clone());

        let receipt = relay
            .send_outbound(Source::Web, "forward me", Some("chat-9"))
            .await;
        assert!(receipt.delivered);
        assert!(receipt.detail.is_none());

        let calls = gateway.calls.lock();
        assert_eq!(calls.as_slice(), &[("chat-9".into(), "forward me".into())]);
    }

    #[tokio::test]
    async fn test_outbound_without_target_is_soft_failure() {
        let gateway = RecordingGateway::new();
        let relay = relay_with(gateway.clone());

        let receipt = relay.send_outbound(Source::Web, "hi", None).await;
        assert!(!receipt.delivered);
        assert!(receipt.detail.unwrap().contains("not configured"));

        // Still recorded locally, nothing reached the gateway.
        assert_eq!(relay.messages_since(0).len(), 1);
        assert!(gateway.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_across_directions() {
        let relay = relay_with(RecordingGateway::new());

        relay.ingest_platform(1, "a", None);
        relay.send_outbound(Source::Web, "b", Some("c")).await;
        relay.ingest_platform(2, "c", None);

        let ids: Vec<u64> = relay.messages_since(0).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_subscriber_gets_snapshot_then_live() {
        let relay = relay_with(RecordingGateway::new());

        relay.ingest_platform(1, "one", None);
        relay.ingest_platform(2, "two", None);

        let sub = relay.subscribe();
        assert_eq!(relay.subscriber_count(), 1);

        relay.ingest_platform(3, "three", None);

        let timeout = Duration::from_millis(20);
        let texts = [
            sub.next_message(timeout).await.unwrap().text,
            sub.next_message(timeout).await.unwrap().text,
            sub.next_message(timeout).await.unwrap().text,
        ];
        assert_eq!(texts, ["one", "two", "three"]);
        assert!(sub.next_message(timeout).await.is_none());

        drop(sub);
        assert_eq!(relay.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_has_no_gap_under_concurrent_ingest() {
        let relay = Arc::new(relay_with(RecordingGateway::new()));

        let writer = {
            let relay = relay.clone();
            tokio::spawn(async move {
                for update_id in 0..200 {
                    relay.ingest_platform(update_id, format!("m{update_id}"), None);
                    tokio::task::yield_now().await;
                }
            })
        };

        // Subscribe repeatedly while the writer runs. Whatever the
        // interleaving, each subscriber must see strictly consecutive
        // ids across the snapshot→live boundary: a skipped id means a
        // message fell between the snapshot and the registration.
        for _ in 0..50 {
            let sub = relay.subscribe();
            let mut last: Option<u64> = None;
            while let Some(msg) = sub.next_message(Duration::from_millis(50)).await {
                if let Some(prev) = last {
                    assert_eq!(msg.id, prev + 1, "gap at the snapshot/live boundary");
                }
                last = Some(msg.id);
            }
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_system_reply_is_recorded_and_dispatched() {
        let gateway = RecordingGateway::new();
        let relay = relay_with(gateway.clone());

        relay
            .send_outbound(Source::System, "auto reply", Some("chat-2"))
            .await;

        let recorded = relay.messages_since(0);
        assert_eq!(recorded[0].source, Source::System);
        assert_eq!(gateway.calls.lock().len(), 1);
    }
}
