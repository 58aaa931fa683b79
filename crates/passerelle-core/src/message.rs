use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a relayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Sent by the web chat widget.
    Web,
    /// Delivered by the external messaging platform.
    Platform,
    /// Generated by the relay itself (auto-replies, notices).
    System,
}

/// The canonical relay record.
///
/// `id` is assigned by the relay and increases monotonically for the
/// lifetime of the process; it is independent of any identifier the
/// platform supplies. `external_ref` carries the platform chat id for
/// dispatch targeting and is omitted from the wire form when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub source: Source,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}
