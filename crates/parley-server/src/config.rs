//! Server configuration with layered loading.
//!
//! Values are resolved in priority order: compiled defaults, then an
//! optional JSON file, then `PARLEY_*` environment variables (nested keys
//! separated by `__`, e.g. `PARLEY_PRESENCE__GRACE_SECS=10`).

use std::path::Path;

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use parley_core::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the parley server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound channel capacity per session.
    pub session_channel_capacity: usize,
    /// Frames a session may drop before it is evicted as a slow consumer.
    pub max_dropped_frames: u64,
    /// Interval between server-initiated Ping frames, in seconds.
    pub ping_interval_secs: u64,
    /// Close the socket when no client activity arrives for this long.
    pub idle_timeout_secs: u64,
    /// Presence state-machine timings.
    pub presence: PresenceConfig,
    /// Retry policy for best-effort persistence writes.
    pub retry: RetryConfig,
}

/// Timings for the presence tracker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Grace window after a disconnect before "offline" is broadcast.
    pub grace_secs: u64,
    /// Interval of the stale-heartbeat sweep.
    pub sweep_interval_secs: u64,
    /// Heartbeat age beyond which the sweep forces a user offline.
    pub offline_after_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            session_channel_capacity: 256,
            max_dropped_frames: 64,
            ping_interval_secs: 30,
            idle_timeout_secs: 90,
            presence: PresenceConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            grace_secs: 5,
            sweep_interval_secs: 30,
            offline_after_secs: 120,
        }
    }
}

impl ServerConfig {
    /// Load configuration: defaults, optional JSON file, `PARLEY_*` env.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }
        figment.merge(Env::prefixed("PARLEY_").split("__")).extract()
    }
}
