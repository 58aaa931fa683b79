//! Boundary to the external messaging platform.

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single dispatch attempt.
///
/// Dispatch is fire-and-forget beyond one bounded-timeout try: none of
/// these variants trigger a retry, and none unwind a message that has
/// already been recorded and distributed locally.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway is not configured")]
    NotConfigured,

    #[error("gateway request failed: {0}")]
    Http(String),

    #[error("gateway rejected the message: {0}")]
    Rejected(String),
}

/// Send side of the Messaging Gateway.
///
/// The concrete platform client lives in the server crate; the relay
/// core only ever sees this trait.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// One dispatch attempt toward `target`. Implementations must
    /// bound their own timeout.
    async fn send(&self, target: &str, text: &str) -> Result<(), GatewayError>;
}
