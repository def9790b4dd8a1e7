//! Room membership: conversation → set of live sessions.
//!
//! A session belongs to at most one room at a time (the client keeps a
//! single conversation open); `join` enforces that by leaving any prior
//! room first. Membership is rebuilt from scratch on every connect and
//! never persisted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use parley_core::{ConversationId, SessionId};

use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;
use crate::ws::connection::SessionHandle;

#[derive(Default)]
struct RoomsInner {
    members: HashMap<ConversationId, HashSet<SessionId>>,
    current: HashMap<SessionId, ConversationId>,
}

/// Tracks which sessions are in which conversation room.
///
/// Authorization-agnostic: callers check conversation membership before
/// invoking [`RoomRegistry::join`].
pub struct RoomRegistry {
    inner: Mutex<RoomsInner>,
    registry: Arc<ConnectionRegistry>,
}

impl RoomRegistry {
    /// Create a room registry resolving sessions through `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            inner: Mutex::new(RoomsInner::default()),
            registry,
        }
    }

    /// Put a session into a room, leaving any prior room first.
    pub fn join(&self, session_id: &SessionId, conversation_id: &ConversationId) {
        let mut inner = self.inner.lock();
        if let Some(prev) = inner.current.remove(session_id) {
            if let Some(set) = inner.members.get_mut(&prev) {
                let _ = set.remove(session_id);
                if set.is_empty() {
                    let _ = inner.members.remove(&prev);
                }
            }
        }
        let _ = inner
            .members
            .entry(conversation_id.clone())
            .or_default()
            .insert(session_id.clone());
        let _ = inner
            .current
            .insert(session_id.clone(), conversation_id.clone());
        debug!(%session_id, %conversation_id, "session joined room");
    }

    /// Remove a session from a room. Unknown rooms and non-members are
    /// no-ops.
    pub fn leave(&self, session_id: &SessionId, conversation_id: &ConversationId) {
        let mut inner = self.inner.lock();
        if inner.current.get(session_id) == Some(conversation_id) {
            let _ = inner.current.remove(session_id);
        }
        if let Some(set) = inner.members.get_mut(conversation_id) {
            let _ = set.remove(session_id);
            if set.is_empty() {
                let _ = inner.members.remove(conversation_id);
            }
        }
    }

    /// Drop a session from whatever room it is in (disconnect cleanup).
    pub fn remove_session(&self, session_id: &SessionId) {
        let mut inner = self.inner.lock();
        if let Some(room) = inner.current.remove(session_id) {
            if let Some(set) = inner.members.get_mut(&room) {
                let _ = set.remove(session_id);
                if set.is_empty() {
                    let _ = inner.members.remove(&room);
                }
            }
        }
    }

    /// The room a session currently has open, if any.
    pub fn current_room(&self, session_id: &SessionId) -> Option<ConversationId> {
        self.inner.lock().current.get(session_id).cloned()
    }

    /// Whether a session is currently in the given room.
    pub fn is_member(&self, session_id: &SessionId, conversation_id: &ConversationId) -> bool {
        self.inner.lock().current.get(session_id) == Some(conversation_id)
    }

    /// Session ids currently in a room.
    pub fn members(&self, conversation_id: &ConversationId) -> Vec<SessionId> {
        self.inner
            .lock()
            .members
            .get(conversation_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sessions in a room.
    pub fn member_count(&self, conversation_id: &ConversationId) -> usize {
        self.inner
            .lock()
            .members
            .get(conversation_id)
            .map_or(0, HashSet::len)
    }

    /// Deliver an event to every room member except `exclude`.
    ///
    /// The event is serialized once; each delivery is a non-blocking
    /// channel write, so one stalled recipient cannot hold up the rest.
    /// Returns the number of sessions that accepted the frame.
    pub fn broadcast(
        &self,
        conversation_id: &ConversationId,
        event: &ServerEvent,
        exclude: Option<&SessionId>,
    ) -> usize {
        let Some(json) = event.to_json() else { return 0 };

        let member_ids = self.members(conversation_id);
        let recipients: Vec<Arc<SessionHandle>> = member_ids
            .iter()
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| self.registry.session(id))
            .collect();

        debug!(
            event = %event.event,
            %conversation_id,
            recipients = recipients.len(),
            "room broadcast"
        );
        recipients
            .iter()
            .filter(|handle| handle.send_raw(json.clone()))
            .count()
    }
}
