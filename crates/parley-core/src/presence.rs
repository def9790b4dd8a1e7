//! Persisted presence records.
//!
//! The wire and store status is binary (online/offline). The intermediate
//! grace-disconnect state is internal to the server's presence tracker and
//! never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A user's derived online/offline status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// At least one live session.
    Online,
    /// No live session (or grace window expired).
    Offline,
}

/// One logical presence record per user.
///
/// The in-memory tracker owns the authoritative copy; this record is the
/// best-effort durable mirror written on offline transitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// The user this record describes.
    pub user_id: UserId,
    /// Mirrored status.
    pub status: PresenceStatus,
    /// When the user was last seen active.
    pub last_active: DateTime<Utc>,
}

impl PresenceRecord {
    /// Record an online user active now.
    pub fn online(user_id: UserId) -> Self {
        Self {
            user_id,
            status: PresenceStatus::Online,
            last_active: Utc::now(),
        }
    }

    /// Record an offline user, last active at the given instant.
    pub fn offline(user_id: UserId, last_active: DateTime<Utc>) -> Self {
        Self {
            user_id,
            status: PresenceStatus::Offline,
            last_active,
        }
    }
}
