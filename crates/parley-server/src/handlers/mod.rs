//! Inbound-event handlers, one per wire event.

pub mod conversation;
pub mod friend;
pub mod reaction;
pub mod status;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::dispatch::EventRegistry;
use crate::errors::EventError;
use crate::events::client;

/// Register every handler under its wire event name.
pub fn register_all(registry: &mut EventRegistry) {
    registry.register(client::JOIN_CONVERSATION, conversation::JoinConversation);
    registry.register(client::LEAVE_CONVERSATION, conversation::LeaveConversation);
    registry.register(client::SEND_MESSAGE, conversation::SendMessage);
    registry.register(client::DELETE_MESSAGE, conversation::DeleteMessage);
    registry.register(client::FETCH_MESSAGES, conversation::FetchMessages);
    registry.register(client::TYPING, conversation::Typing { stopped: false });
    registry.register(client::STOP_TYPING, conversation::Typing { stopped: true });
    registry.register(client::REACT_MESSAGE, reaction::ReactMessage);
    registry.register(client::FETCH_REACTIONS, reaction::FetchReactions);
    registry.register(client::USER_STATUS, status::UserStatus);
    registry.register(client::FRIEND_REQUEST_SEND, friend::SendFriendRequest);
    registry.register(client::FRIEND_REQUEST_ACCEPT, friend::AcceptFriendRequest);
    registry.register(client::FRIEND_REQUEST_REJECT, friend::RejectFriendRequest);
    registry.register(client::FRIEND_REMOVE, friend::RemoveFriend);
    registry.register(client::FETCH_FRIEND_REQUESTS, friend::FetchFriendRequests);
}

/// Deserialize an event payload, mapping failures to a validation error.
pub(crate) fn parse_params<T: DeserializeOwned>(data: Value) -> Result<T, EventError> {
    serde_json::from_value(data).map_err(|e| EventError::validation(format!("invalid params: {e}")))
}

/// Reject empty identifiers before any mutation.
pub(crate) fn require_id(field: &str, value: &str) -> Result<(), EventError> {
    if value.is_empty() {
        return Err(EventError::validation(format!("{field} is required")));
    }
    Ok(())
}
