//! Reaction bookkeeping types.
//!
//! One entry exists per (message, user). The `count` field accumulates on
//! every add call; removing discards the entry (and its count) outright.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, UserId};

/// A persisted reaction entry for one (message, user) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionEntry {
    /// The reacted-to message.
    pub message_id: MessageId,
    /// The reacting user.
    pub user_id: UserId,
    /// Reaction kind, e.g. `"heart"`. The latest add wins.
    #[serde(rename = "type")]
    pub kind: String,
    /// Number of add calls recorded for this entry.
    pub count: u32,
}

impl ReactionEntry {
    /// First reaction from a user on a message.
    pub fn new(message_id: MessageId, user_id: UserId, kind: impl Into<String>) -> Self {
        Self {
            message_id,
            user_id,
            kind: kind.into(),
            count: 1,
        }
    }

    /// Apply another add call: bump the count, overwrite the kind.
    pub fn bump(&mut self, kind: impl Into<String>) {
        self.kind = kind.into();
        self.count = self.count.saturating_add(1);
    }
}

/// The per-user value inside a reaction snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionValue {
    /// Reaction kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Accumulated count.
    pub count: u32,
}

/// Full snapshot map for one message: `{userId: {type, count}}`.
///
/// Broadcast whole after every mutation rather than as a delta. A `BTreeMap`
/// keeps the wire output stable for tests.
pub type ReactionSnapshot = BTreeMap<String, ReactionValue>;

/// Build a snapshot map from stored entries.
pub fn snapshot_from_entries(entries: &[ReactionEntry]) -> ReactionSnapshot {
    entries
        .iter()
        .map(|e| {
            (
                e.user_id.as_str().to_owned(),
                ReactionValue {
                    kind: e.kind.clone(),
                    count: e.count,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user: &str, kind: &str, count: u32) -> ReactionEntry {
        ReactionEntry {
            message_id: MessageId::from("m1"),
            user_id: UserId::from(user),
            kind: kind.into(),
            count,
        }
    }

    #[test]
    fn new_entry_starts_at_one() {
        let e = ReactionEntry::new(MessageId::from("m1"), UserId::from("u1"), "heart");
        assert_eq!(e.count, 1);
        assert_eq!(e.kind, "heart");
    }

    #[test]
    fn bump_increments_and_overwrites_kind() {
        let mut e = entry("u1", "heart", 2);
        e.bump("laugh");
        assert_eq!(e.count, 3);
        assert_eq!(e.kind, "laugh");
    }

    #[test]
    fn bump_saturates_at_max() {
        let mut e = entry("u1", "heart", u32::MAX);
        e.bump("heart");
        assert_eq!(e.count, u32::MAX);
    }

    #[test]
    fn kind_serializes_as_type() {
        let e = entry("u1", "heart", 1);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "heart");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn snapshot_maps_user_to_value() {
        let entries = vec![entry("u1", "heart", 3), entry("u2", "laugh", 1)];
        let snap = snapshot_from_entries(&entries);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["u1"].kind, "heart");
        assert_eq!(snap["u1"].count, 3);
        assert_eq!(snap["u2"].count, 1);
    }

    #[test]
    fn empty_snapshot_from_no_entries() {
        let snap = snapshot_from_entries(&[]);
        assert!(snap.is_empty());
    }

    #[test]
    fn snapshot_wire_shape() {
        let snap = snapshot_from_entries(&[entry("u1", "heart", 2)]);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["u1"]["type"], "heart");
        assert_eq!(json["u1"]["count"], 2);
    }
}
