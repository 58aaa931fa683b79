//! HTTP surface and platform adapter for the passerelle relay.
//!
//! The relay engine itself lives in `passerelle-core`; this crate
//! wires it to the outside world: an axum router for the web widget,
//! a reqwest client toward the messaging platform's send API, env
//! configuration and the optional auto-reply rules.

pub mod api;
pub mod autoreply;
pub mod config;
pub mod error;
pub mod gateway;
