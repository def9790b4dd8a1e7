//! # parley-server
//!
//! Axum HTTP + `WebSocket` server for real-time messaging.
//!
//! - `WebSocket` gateway: session lifecycle, heartbeats, frame dispatch
//! - Connection registry: user → live sessions, heartbeat refresh
//! - Room membership: single-room-per-session invariant, non-blocking
//!   fanout with slow-consumer eviction
//! - Presence: grace-period disconnects, periodic stale sweep, best-effort
//!   store mirror
//! - Conversation fanout, reaction aggregation, friend request state
//!   machine
//! - HTTP endpoints: `/health`, `/metrics`
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod friends;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod presence;
pub mod reactions;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod shutdown;
pub mod store_retry;
pub mod ws;

#[cfg(test)]
mod test_support;

pub use config::{PresenceConfig, ServerConfig};
pub use errors::EventError;
pub use server::{AppState, ParleyServer};
