//! Wire-format frames: named events with JSON payloads.
//!
//! Inbound frames are `{type, data}`; outbound frames additionally carry an
//! RFC-3339 timestamp. Event names are kebab-case and listed here as
//! constants so handlers and tests never spell them inline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client→server event names.
pub mod client {
    /// Join a conversation room.
    pub const JOIN_CONVERSATION: &str = "join-conversation";
    /// Leave a conversation room.
    pub const LEAVE_CONVERSATION: &str = "leave-conversation";
    /// Send a message to the current room.
    pub const SEND_MESSAGE: &str = "send-message";
    /// Tombstone an own message.
    pub const DELETE_MESSAGE: &str = "delete-message";
    /// Fetch message history for a conversation.
    pub const FETCH_MESSAGES: &str = "fetch-messages";
    /// Started typing.
    pub const TYPING: &str = "typing";
    /// Stopped typing.
    pub const STOP_TYPING: &str = "stop-typing";
    /// Add or remove a reaction (`action` field selects).
    pub const REACT_MESSAGE: &str = "react-message";
    /// Batch-fetch reaction snapshots (late joiners).
    pub const FETCH_REACTIONS: &str = "fetch-reactions";
    /// Explicit presence announcement.
    pub const USER_STATUS: &str = "user-status";
    /// Send a friend request.
    pub const FRIEND_REQUEST_SEND: &str = "friend-request-send";
    /// Accept a pending friend request.
    pub const FRIEND_REQUEST_ACCEPT: &str = "friend-request-accept";
    /// Reject a pending friend request.
    pub const FRIEND_REQUEST_REJECT: &str = "friend-request-reject";
    /// Remove an accepted friend.
    pub const FRIEND_REMOVE: &str = "friend-remove";
    /// Fetch the caller's pending incoming requests.
    pub const FETCH_FRIEND_REQUESTS: &str = "fetch-friend-requests";
}

/// Server→client event names.
pub mod server {
    /// Greeting carrying the assigned session id.
    pub const CONNECTION_ESTABLISHED: &str = "connection-established";
    /// A message arrived in the room.
    pub const RECEIVE_MESSAGE: &str = "receive-message";
    /// The sender's own message was persisted.
    pub const SEND_ACKNOWLEDGED: &str = "send-acknowledged";
    /// A room message was tombstoned.
    pub const MESSAGE_DELETED: &str = "message-deleted";
    /// Message history reply.
    pub const MESSAGE_HISTORY: &str = "message-history";
    /// Full reaction snapshot for one message.
    pub const MESSAGE_REACTION: &str = "message-reaction";
    /// Batch reaction snapshot reply.
    pub const REACTION_SNAPSHOTS: &str = "reaction-snapshots";
    /// A user's presence changed.
    pub const USER_STATUS_CHANGE: &str = "user-status-change";
    /// Someone in the room is typing.
    pub const TYPING: &str = "typing";
    /// Someone stopped typing.
    pub const STOP_TYPING: &str = "stop-typing";
    /// A friend request arrived.
    pub const FRIEND_REQUEST_RECEIVED: &str = "friend-request-received";
    /// A friend request was accepted.
    pub const FRIEND_REQUEST_ACCEPTED: &str = "friend-request-accepted";
    /// A friend request was rejected.
    pub const FRIEND_REQUEST_REJECTED: &str = "friend-request-rejected";
    /// A friendship was removed.
    pub const FRIEND_REMOVED: &str = "friend-removed";
    /// Pending incoming requests reply.
    pub const FRIEND_REQUESTS: &str = "friend-requests";
    /// An inbound event failed.
    pub const ERROR: &str = "error";
}

/// Inbound frame from a client.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientFrame {
    /// Event name.
    #[serde(rename = "type")]
    pub event: String,
    /// Event payload; defaults to null for payload-free events.
    #[serde(default)]
    pub data: Value,
}

/// Outbound frame pushed to clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Event name.
    #[serde(rename = "type")]
    pub event: String,
    /// ISO-8601 timestamp with millisecond precision.
    pub timestamp: String,
    /// Event payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ServerEvent {
    /// Create an event stamped with the current UTC time.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            data: Some(data),
        }
    }

    /// Create a payload-free event.
    pub fn bare(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            data: None,
        }
    }

    /// Serialize once for fanout to many sessions.
    pub fn to_json(&self) -> Option<std::sync::Arc<String>> {
        match serde_json::to_string(self) {
            Ok(json) => Some(std::sync::Arc::new(json)),
            Err(e) => {
                tracing::error!(event = %self.event, error = %e, "failed to serialize event");
                None
            }
        }
    }
}
