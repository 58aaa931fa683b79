//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the relay can start with zero
//! configuration for local development (outbound dispatch then reports
//! a soft failure until `GATEWAY_URL` is set).

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Full URL of the messaging platform's send endpoint.
    /// Env: `GATEWAY_URL`
    /// Default: unset (outbound sends fail softly).
    pub gateway_url: Option<String>,

    /// Default chat/conversation id to dispatch to when a request does
    /// not name one.
    /// Env: `GATEWAY_TARGET`
    /// Default: unset.
    pub gateway_target: Option<String>,

    /// Recent-history buffer capacity.
    /// Env: `HISTORY_CAPACITY`
    /// Default: `200`
    pub history_capacity: usize,

    /// Per-subscriber delivery queue capacity.
    /// Env: `SUBSCRIBER_QUEUE_CAPACITY`
    /// Default: `128`
    pub subscriber_queue_capacity: usize,

    /// How many recent platform update ids to remember for dedup.
    /// Env: `DEDUP_CAPACITY`
    /// Default: `1024`
    pub dedup_capacity: usize,

    /// Idle interval after which a stream connection gets a keep-alive
    /// comment frame.
    /// Env: `HEARTBEAT_SECS`
    /// Default: `20`
    pub heartbeat: Duration,

    /// Upper bound on a single gateway dispatch attempt.
    /// Env: `DISPATCH_TIMEOUT_SECS`
    /// Default: `10`
    pub dispatch_timeout: Duration,

    /// Whether inbound platform messages get an automatic reply.
    /// Env: `AUTO_REPLY` (true/false)
    /// Default: `false`
    pub auto_reply: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            gateway_url: None,
            gateway_target: None,
            history_capacity: 200,
            subscriber_queue_capacity: 128,
            dedup_capacity: 1024,
            heartbeat: Duration::from_secs(20),
            dispatch_timeout: Duration::from_secs(10),
            auto_reply: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = parse_var::<SocketAddr>("HTTP_ADDR") {
            config.http_addr = addr;
        }

        if let Ok(url) = std::env::var("GATEWAY_URL") {
            if !url.is_empty() {
                config.gateway_url = Some(url);
            }
        }

        if let Ok(target) = std::env::var("GATEWAY_TARGET") {
            if !target.is_empty() {
                config.gateway_target = Some(target);
            }
        }

        if let Some(n) = parse_var::<usize>("HISTORY_CAPACITY") {
            config.history_capacity = n;
        }

        if let Some(n) = parse_var::<usize>("SUBSCRIBER_QUEUE_CAPACITY") {
            config.subscriber_queue_capacity = n;
        }

        if let Some(n) = parse_var::<usize>("DEDUP_CAPACITY") {
            config.dedup_capacity = n;
        }

        if let Some(secs) = parse_var::<u64>("HEARTBEAT_SECS") {
            config.heartbeat = Duration::from_secs(secs.max(1));
        }

        if let Some(secs) = parse_var::<u64>("DISPATCH_TIMEOUT_SECS") {
            config.dispatch_timeout = Duration::from_secs(secs.max(1));
        }

        if let Ok(raw) = std::env::var("AUTO_REPLY") {
            match parse_bool(&raw) {
                Some(enabled) => config.auto_reply = enabled,
                None => {
                    tracing::warn!(var = "AUTO_REPLY", value = %raw, "Invalid value, using default")
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's
        // EnvFilter, so it is not stored here.

        config
    }
}

/// Case-insensitive boolean parse accepting the usual spellings.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse an env var, warning (and falling back) on invalid values.
fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Invalid value, using default");
            None
        }
    }
}
