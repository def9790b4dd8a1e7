//! Connection registry: user identity → live sessions.
//!
//! Owns session lifecycle bookkeeping. All map mutation happens under one
//! lock with no suspension points, so a disconnect racing a heartbeat on
//! the same session can never interleave mid-update.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use parley_core::{SessionId, UserId};

use crate::events::ServerEvent;
use crate::ws::connection::SessionHandle;

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<SessionId, Arc<SessionHandle>>,
    by_user: HashMap<UserId, HashSet<SessionId>>,
}

/// Registry of live connections indexed by session id and user id.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new session.
    pub fn register(&self, handle: Arc<SessionHandle>) {
        let mut inner = self.inner.lock();
        let _ = inner
            .by_user
            .entry(handle.user_id.clone())
            .or_default()
            .insert(handle.id.clone());
        let _ = inner.sessions.insert(handle.id.clone(), handle);
        metrics::gauge!("ws_connections_active").increment(1.0);
    }

    /// Remove a session; returns its handle if it was tracked.
    pub fn unregister(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        let mut inner = self.inner.lock();
        let handle = inner.sessions.remove(session_id)?;
        if let Some(set) = inner.by_user.get_mut(&handle.user_id) {
            let _ = set.remove(session_id);
            if set.is_empty() {
                let _ = inner.by_user.remove(&handle.user_id);
            }
        }
        metrics::gauge!("ws_connections_active").decrement(1.0);
        Some(handle)
    }

    /// Refresh a session's heartbeat timestamp.
    ///
    /// Unknown session ids are ignored — the connection was already reaped
    /// and a late heartbeat must not fail.
    pub fn touch(&self, session_id: &SessionId) {
        if let Some(handle) = self.inner.lock().sessions.get(session_id) {
            handle.touch();
        } else {
            debug!(%session_id, "heartbeat for unknown session ignored");
        }
    }

    /// All live sessions for a user (possibly empty).
    pub fn lookup(&self, user_id: &UserId) -> Vec<Arc<SessionHandle>> {
        let inner = self.inner.lock();
        inner
            .by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.sessions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fetch one session by id.
    pub fn session(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.inner.lock().sessions.get(session_id).cloned()
    }

    /// Whether the user has at least one live session.
    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.inner.lock().by_user.contains_key(user_id)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Snapshot of every live session.
    pub fn all_sessions(&self) -> Vec<Arc<SessionHandle>> {
        self.inner.lock().sessions.values().cloned().collect()
    }

    /// Deliver an event to every session of one user.
    ///
    /// Returns how many sessions accepted the frame.
    pub fn send_to_user(&self, user_id: &UserId, event: &ServerEvent) -> usize {
        let Some(json) = event.to_json() else { return 0 };
        self.lookup(user_id)
            .iter()
            .filter(|handle| handle.send_raw(json.clone()))
            .count()
    }

    /// Deliver an event to every live session.
    pub fn broadcast_all(&self, event: &ServerEvent) -> usize {
        let Some(json) = event.to_json() else { return 0 };
        self.all_sessions()
            .iter()
            .filter(|handle| handle.send_raw(json.clone()))
            .count()
    }
}
