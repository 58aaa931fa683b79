//! Relay engine bridging a web chat widget and an external messaging
//! platform.
//!
//! The engine deduplicates at-least-once webhook deliveries, keeps a
//! bounded buffer of recent traffic, and fans new messages out to any
//! number of live subscribers without ever blocking the producer side.
//! Everything here is transport-agnostic: the HTTP surface lives in
//! `passerelle-server`, and the external platform is reached through
//! the [`gateway::Gateway`] trait.

pub mod dedup;
pub mod fanout;
pub mod gateway;
pub mod history;
pub mod message;
pub mod relay;

pub use dedup::Deduplicator;
pub use fanout::{Distributor, SubscriberHandle};
pub use gateway::{Gateway, GatewayError};
pub use history::HistoryBuffer;
pub use message::{Message, Source};
pub use relay::{OutboundReceipt, Relay, RelayConfig};
