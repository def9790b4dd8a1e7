//! Key scheme for store records.
//!
//! Every record type gets a distinct prefix so direct lookups never
//! collide. Cross-key reads go through `query_by_attribute` on a top-level
//! field of the document (`conversationId` for messages, `messageId` for
//! reactions, `target` for pending friend requests).

use parley_core::{ConversationId, MessageId, UserId};

/// Key of a user profile record.
pub fn profile(user_id: &UserId) -> String {
    format!("user:{user_id}")
}

/// Key of a presence mirror record.
pub fn presence(user_id: &UserId) -> String {
    format!("presence:{user_id}")
}

/// Key of a conversation record.
pub fn conversation(id: &ConversationId) -> String {
    format!("conversation:{id}")
}

/// Key of a message record.
pub fn message(id: &MessageId) -> String {
    format!("message:{id}")
}

/// Key of the reaction entry for one (message, user) pair.
pub fn reaction(message_id: &MessageId, user_id: &UserId) -> String {
    format!("reaction:{message_id}:{user_id}")
}

/// Key of the pending friend-request edge requester→target.
pub fn friend_request(requester: &UserId, target: &UserId) -> String {
    format!("friend-request:{requester}:{target}")
}

/// Key of one direction of an accepted friendship.
pub fn friend_edge(user_id: &UserId, friend_id: &UserId) -> String {
    format!("friend:{user_id}:{friend_id}")
}
