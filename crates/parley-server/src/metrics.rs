//! Prometheus metrics recorder and name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Must be
/// called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound frames dropped on full or closed channels (counter).
pub const WS_FRAMES_DROPPED_TOTAL: &str = "ws_frames_dropped_total";
/// Inbound events total (counter, labels: event).
pub const EVENTS_TOTAL: &str = "events_total";
/// Inbound event failures (counter, labels: event, code).
pub const EVENT_ERRORS_TOTAL: &str = "event_errors_total";
/// Event handling duration in seconds (histogram, labels: event).
pub const EVENT_DURATION_SECONDS: &str = "event_duration_seconds";
/// Presence edges (counter, labels: status).
pub const PRESENCE_TRANSITIONS_TOTAL: &str = "presence_transitions_total";
/// Messages fanned out (counter).
pub const MESSAGES_SENT_TOTAL: &str = "messages_sent_total";
/// Reaction mutations (counter, labels: action).
pub const REACTIONS_TOTAL: &str = "reactions_total";
/// Friend request transitions (counter, labels: transition).
pub const FRIEND_REQUESTS_TOTAL: &str = "friend_requests_total";
/// Store writes retried in the background (counter, labels: op).
pub const STORE_RETRIES_TOTAL: &str = "store_retries_total";
/// Store writes abandoned after exhausting retries (counter, labels: op).
pub const STORE_RETRIES_EXHAUSTED_TOTAL: &str = "store_retries_exhausted_total";
