//! Conversation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, UserId};

/// A one-to-one or group conversation.
///
/// The participant list is the authorization boundary for room joins:
/// a session may only join a conversation its user participates in.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation id.
    pub id: ConversationId,
    /// Optional display name (group conversations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Users allowed to view and join this conversation.
    pub participants: Vec<UserId>,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation with the given participants.
    pub fn new(participants: Vec<UserId>) -> Self {
        Self {
            id: ConversationId::new(),
            name: None,
            participants,
            created_at: Utc::now(),
        }
    }

    /// Whether the user may view this conversation.
    pub fn is_participant(&self, user_id: &UserId) -> bool {
        self.participants.contains(user_id)
    }
}
