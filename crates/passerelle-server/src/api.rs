//! HTTP API: the relay's web-facing surface.
//!
//! Routes:
//! - `POST /relay/outbound` — widget send, forwarded to the gateway
//! - `POST /relay/inbound`  — platform webhook
//! - `GET  /relay/stream`   — live SSE feed (snapshot first)
//! - `GET  /relay/snapshot` — polling fallback with a `since` cursor
//! - `GET  /health`         — liveness only

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::Method,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{stream, Stream};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use passerelle_core::{Message, Relay, Source};

use crate::autoreply::RuleSet;
use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub config: Arc<ServerConfig>,
    pub auto_reply: Option<Arc<RuleSet>>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/relay/outbound", post(relay_outbound))
        .route("/relay/inbound", post(relay_inbound))
        .route("/relay/stream", get(relay_stream))
        .route("/relay/snapshot", get(relay_snapshot))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request/response types ───

#[derive(Deserialize)]
struct OutboundRequest {
    text: String,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Serialize)]
struct OutboundResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Platform webhook envelope. The payload may arrive under any of the
/// three message keys depending on the event kind.
#[derive(Deserialize)]
struct InboundEnvelope {
    update_id: i64,
    #[serde(default)]
    message: Option<InboundMessage>,
    #[serde(default)]
    edited_message: Option<InboundMessage>,
    #[serde(default)]
    channel_post: Option<InboundMessage>,
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    chat: Option<ChatRef>,
}

#[derive(Deserialize)]
struct ChatRef {
    id: i64,
}

#[derive(Serialize)]
struct AckResponse {
    ok: bool,
}

#[derive(Deserialize)]
struct SnapshotParams {
    #[serde(default)]
    since: Option<u64>,
}

#[derive(Serialize)]
struct SnapshotResponse {
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Web → platform. The message is recorded and distributed locally
/// first; the gateway outcome only flips the `ok` flag, never the
/// HTTP status.
async fn relay_outbound(
    State(state): State<AppState>,
    Json(req): Json<OutboundRequest>,
) -> Result<Json<OutboundResponse>, ServerError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ServerError::BadRequest("missing text".into()));
    }

    let target = req
        .target
        .as_deref()
        .or(state.config.gateway_target.as_deref());

    let receipt = state.relay.send_outbound(Source::Web, text, target).await;

    Ok(Json(OutboundResponse {
        ok: receipt.delivered,
        error: receipt.detail,
    }))
}

/// Platform → web. Always acknowledges quickly: duplicates and
/// text-less events get the same 200 as fresh messages so the platform
/// never retries.
async fn relay_inbound(
    State(state): State<AppState>,
    Json(envelope): Json<InboundEnvelope>,
) -> Json<AckResponse> {
    let payload = envelope
        .message
        .or(envelope.edited_message)
        .or(envelope.channel_post);

    let Some(payload) = payload else {
        return Json(AckResponse { ok: true });
    };
    let Some(text) = payload.text.filter(|t| !t.is_empty()) else {
        return Json(AckResponse { ok: true });
    };

    let chat = payload.chat.map(|c| c.id.to_string());

    let Some(msg) = state
        .relay
        .ingest_platform(envelope.update_id, text.clone(), chat.clone())
    else {
        // Duplicate delivery: already processed, ack identically.
        return Json(AckResponse { ok: true });
    };

    info!(
        id = msg.id,
        update_id = envelope.update_id,
        "platform message relayed"
    );

    // Auto-reply runs off the request path so the webhook ack stays
    // sub-second regardless of gateway latency.
    if let (Some(rules), Some(chat)) = (state.auto_reply.clone(), chat) {
        let relay = state.relay.clone();
        let reply = rules.reply_for(&text);
        tokio::spawn(async move {
            relay
                .send_outbound(Source::System, reply, Some(&chat))
                .await;
        });
    }

    Json(AckResponse { ok: true })
}

/// Long-lived SSE feed: current history snapshot first, then each new
/// message as it is published, interleaved with keep-alive comments on
/// idle. Client disconnect drops the subscriber handle, which
/// unregisters its queue.
async fn relay_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscriber = state.relay.subscribe();
    let heartbeat = state.config.heartbeat;

    let stream = stream::unfold(subscriber, move |subscriber| async move {
        let event = match subscriber.next_message(heartbeat).await {
            Some(msg) => message_event(&msg),
            // Idle past the heartbeat interval: comment frame only,
            // nothing recorded, nothing delivered.
            None => Event::default().comment("keep-alive"),
        };
        Some((Ok::<_, Infallible>(event), subscriber))
    });

    Sse::new(stream)
}

fn message_event(msg: &Message) -> Event {
    match Event::default().json_data(msg) {
        Ok(event) => event,
        Err(e) => {
            warn!(id = msg.id, error = %e, "failed to encode stream frame");
            Event::default().comment("encode-error")
        }
    }
}

/// Polling fallback: everything recorded after the given cursor.
async fn relay_snapshot(
    State(state): State<AppState>,
    Query(params): Query<SnapshotParams>,
) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        messages: state.relay.messages_since(params.since.unwrap_or(0)),
    })
}

// ─── Serving ───

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting relay HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
