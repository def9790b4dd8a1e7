//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket session count.
    pub connections: usize,
    /// Users currently online (grace window included).
    pub online_users: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, online_users: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        online_users,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), 0, 0);
        assert_eq!(resp.status, "ok");
    }

    #[test]
    fn uptime_counts_from_start() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(90))
            .unwrap();
        let resp = health_check(start, 0, 0);
        assert!(resp.uptime_secs >= 89);
    }

    #[test]
    fn counters_pass_through() {
        let resp = health_check(Instant::now(), 7, 3);
        assert_eq!(resp.connections, 7);
        assert_eq!(resp.online_users, 3);
    }

    #[test]
    fn serializes_expected_fields() {
        let resp = health_check(Instant::now(), 1, 1);
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("status").is_some());
        assert!(json.get("uptime_secs").is_some());
        assert!(json.get("connections").is_some());
        assert!(json.get("online_users").is_some());
    }
}
