//! # passerelle-server
//!
//! Relay between a web chat widget and an external messaging platform:
//! - `POST /relay/outbound` forwards widget sends to the platform and
//!   echoes them to every connected stream first
//! - `POST /relay/inbound` accepts the platform's webhook, dedups
//!   at-least-once deliveries and fans fresh messages out
//! - `GET /relay/stream` (SSE) and `GET /relay/snapshot` (polling)
//!   deliver the same per-process message order to web clients

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use passerelle_core::{Gateway, Relay, RelayConfig};
use passerelle_server::api::{self, AppState};
use passerelle_server::autoreply::RuleSet;
use passerelle_server::config::ServerConfig;
use passerelle_server::gateway::{HttpGateway, NullGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,passerelle_server=debug")),
        )
        .init();

    info!("Starting passerelle relay v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let gateway: Arc<dyn Gateway> = match &config.gateway_url {
        Some(url) => Arc::new(HttpGateway::new(url.clone(), config.dispatch_timeout)?),
        None => {
            warn!("GATEWAY_URL is not set; outbound messages will only be recorded locally");
            Arc::new(NullGateway)
        }
    };

    let relay = Arc::new(Relay::new(
        RelayConfig {
            history_capacity: config.history_capacity,
            subscriber_queue_capacity: config.subscriber_queue_capacity,
            dedup_capacity: config.dedup_capacity,
        },
        gateway,
    ));

    let auto_reply = config.auto_reply.then(|| Arc::new(RuleSet::builtin()));
    if auto_reply.is_some() {
        info!("Auto-reply enabled with built-in rules");
    }

    let http_addr = config.http_addr;
    let state = AppState {
        relay,
        config: Arc::new(config),
        auto_reply,
    };

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
