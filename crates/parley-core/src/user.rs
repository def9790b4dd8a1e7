//! User profile record persisted by the store collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::message::SenderSnapshot;
use crate::presence::PresenceStatus;

/// Durable user profile.
///
/// Presence fields here are a best-effort mirror of the in-memory tracker;
/// the authoritative copy lives in the presence tracker while the user has
/// any live session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user's identity.
    pub user_id: UserId,
    /// Display name shown in conversations.
    pub display_name: String,
    /// Avatar image URL, if one was uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Mirrored presence status.
    pub status: PresenceStatus,
    /// Mirrored last-active timestamp.
    pub last_active: DateTime<Utc>,
}

impl UserProfile {
    /// Create a profile with the given display name, initially offline.
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            avatar_url: None,
            status: PresenceStatus::Offline,
            last_active: Utc::now(),
        }
    }

    /// Denormalized snapshot embedded into messages at send time.
    pub fn snapshot(&self) -> SenderSnapshot {
        SenderSnapshot {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profile_is_offline() {
        let p = UserProfile::new(UserId::from("u1"), "Ada");
        assert_eq!(p.status, PresenceStatus::Offline);
        assert_eq!(p.display_name, "Ada");
        assert!(p.avatar_url.is_none());
    }

    #[test]
    fn snapshot_copies_identity_fields() {
        let mut p = UserProfile::new(UserId::from("u1"), "Ada");
        p.avatar_url = Some("https://cdn/avatar.png".into());
        let snap = p.snapshot();
        assert_eq!(snap.user_id, p.user_id);
        assert_eq!(snap.display_name, "Ada");
        assert_eq!(snap.avatar_url.as_deref(), Some("https://cdn/avatar.png"));
    }

    #[test]
    fn serde_uses_camel_case() {
        let p = UserProfile::new(UserId::from("u1"), "Ada");
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("displayName").is_some());
        assert!(json.get("lastActive").is_some());
    }
}
