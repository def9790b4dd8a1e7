//! Friend request edges and accepted friendship pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A pending friend request: a directed requester→target edge.
///
/// At most one pending edge exists per direction. Acceptance replaces it
/// with a symmetric pair of [`FriendEdge`] records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Who sent the request.
    pub requester: UserId,
    /// Who it was sent to.
    pub target: UserId,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

impl FriendRequest {
    /// Create a pending edge timestamped now.
    pub fn new(requester: UserId, target: UserId) -> Self {
        Self {
            requester,
            target,
            created_at: Utc::now(),
        }
    }
}

/// One direction of an accepted friendship.
///
/// Acceptance writes two of these (a↔b). Removal deletes both as
/// independent operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendEdge {
    /// The owning side of this edge.
    pub user_id: UserId,
    /// The befriended user.
    pub friend_id: UserId,
    /// When the friendship was accepted.
    pub since: DateTime<Utc>,
}

impl FriendEdge {
    /// Build the symmetric pair of edges for an accepted request.
    pub fn pair(a: UserId, b: UserId) -> (Self, Self) {
        let since = Utc::now();
        (
            Self {
                user_id: a.clone(),
                friend_id: b.clone(),
                since,
            },
            Self {
                user_id: b,
                friend_id: a,
                since,
            },
        )
    }
}
