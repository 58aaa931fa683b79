//! Messaging Gateway adapters.
//!
//! `HttpGateway` posts to the platform's send endpoint and treats the
//! response body's `ok` flag as the delivery verdict, mirroring the
//! platform bot API. One attempt, bounded timeout, no retries.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use passerelle_core::{Gateway, GatewayError};

/// reqwest-backed gateway client.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGateway {
    /// `endpoint` is the full send URL; `timeout` bounds the whole
    /// request including connect time.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send(&self, target: &str, text: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "chat_id": target, "text": text }))
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("status {status}: {body}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        if body.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            debug!(target, "gateway accepted message");
            Ok(())
        } else {
            Err(GatewayError::Rejected(body.to_string()))
        }
    }
}

/// Stand-in used when `GATEWAY_URL` is unset: every attempt reports a
/// configuration failure, and messages stay local-only.
pub struct NullGateway;

#[async_trait]
impl Gateway for NullGateway {
    async fn send(&self, _target: &str, _text: &str) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
