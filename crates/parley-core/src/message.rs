//! Chat message records with denormalized sender snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

/// Content substituted into a message when it is tombstoned.
pub const DELETED_PLACEHOLDER: &str = "This message has been deleted";

/// What kind of content a message carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Inline image; `content` holds the blob URL.
    Image,
    /// Generic attachment; `content` holds the blob URL.
    File,
}

/// Sender identity captured at send time.
///
/// Denormalized into every message so reads never join against the profile
/// record. The snapshot may go stale if the sender later renames; that
/// trade-off is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderSnapshot {
    /// The sending user.
    pub user_id: UserId,
    /// Display name at send time.
    pub display_name: String,
    /// Avatar URL at send time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl SenderSnapshot {
    /// Fallback snapshot when no profile record exists for the sender.
    pub fn bare(user_id: UserId) -> Self {
        let display_name = user_id.as_str().to_owned();
        Self {
            user_id,
            display_name,
            avatar_url: None,
        }
    }
}

/// A persisted chat message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message id (UUID v7, time-ordered).
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Sender snapshot taken at send time.
    pub sender: SenderSnapshot,
    /// Message body, or a blob URL for image/file kinds.
    pub content: String,
    /// Content kind.
    pub kind: MessageKind,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when the message has been tombstoned.
    pub is_deleted: bool,
}

impl ChatMessage {
    /// Create a new message with a fresh id and the current timestamp.
    pub fn new(
        conversation_id: ConversationId,
        sender: SenderSnapshot,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender,
            content: content.into(),
            kind,
            created_at: Utc::now(),
            is_deleted: false,
        }
    }

    /// Rewrite this message as a tombstone.
    ///
    /// The original content is replaced rather than the record removed, so
    /// history fetches keep a stable shape.
    pub fn tombstone(&mut self) {
        self.content = DELETED_PLACEHOLDER.to_owned();
        self.kind = MessageKind::Text;
        self.is_deleted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChatMessage {
        ChatMessage::new(
            ConversationId::from("conv_1"),
            SenderSnapshot::bare(UserId::from("u1")),
            "hello",
            MessageKind::Text,
        )
    }

    #[test]
    fn new_message_not_deleted() {
        let msg = sample();
        assert!(!msg.is_deleted);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn tombstone_replaces_content() {
        let mut msg = sample();
        msg.tombstone();
        assert!(msg.is_deleted);
        assert_eq!(msg.content, DELETED_PLACEHOLDER);
    }

    #[test]
    fn tombstone_resets_kind_to_text() {
        let mut msg = ChatMessage::new(
            ConversationId::from("conv_1"),
            SenderSnapshot::bare(UserId::from("u1")),
            "https://blobs/pic.png",
            MessageKind::Image,
        );
        msg.tombstone();
        assert_eq!(msg.kind, MessageKind::Text);
    }

    #[test]
    fn bare_snapshot_uses_id_as_name() {
        let snap = SenderSnapshot::bare(UserId::from("u9"));
        assert_eq!(snap.display_name, "u9");
        assert!(snap.avatar_url.is_none());
    }

    #[test]
    fn serde_wire_shape() {
        let msg = sample();
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("conversationId").is_some());
        assert_eq!(json["kind"], "text");
        assert_eq!(json["isDeleted"], false);
        assert_eq!(json["sender"]["userId"], "u1");
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(MessageKind::File).unwrap(), "file");
        assert_eq!(serde_json::to_value(MessageKind::Image).unwrap(), "image");
    }

    #[test]
    fn roundtrip_through_json() {
        let msg = sample();
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.sender, msg.sender);
        assert_eq!(back.content, msg.content);
    }
}
