//! Reaction aggregation and snapshot broadcast.
//!
//! Counts accumulate on every add call — the entry is upserted and its
//! count incremented rather than toggled, and removal discards the entry
//! (count included). After a mutation the full `{userId: {type, count}}`
//! snapshot for the message is recomputed from the store and broadcast
//! whole; late joiners use the batch fetch instead of broadcast replay.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use parley_core::reaction::snapshot_from_entries;
use parley_core::{ConversationId, MessageId, ReactionEntry, ReactionSnapshot};
use parley_store::{keys, Store, StoreError};

use crate::errors::{EventError, MESSAGE_NOT_FOUND};
use crate::events::{server, ServerEvent};
use crate::rooms::RoomRegistry;
use crate::ws::connection::SessionHandle;

/// Per-message reaction bookkeeping over the store, with room broadcast.
pub struct ReactionService {
    rooms: Arc<RoomRegistry>,
    store: Arc<dyn Store>,
}

impl ReactionService {
    /// Create the service over the room registry and store.
    pub fn new(rooms: Arc<RoomRegistry>, store: Arc<dyn Store>) -> Self {
        Self { rooms, store }
    }

    /// Record a reaction and broadcast the updated snapshot to the room.
    ///
    /// Each call increments the stored count for the (message, user) entry
    /// and overwrites its kind with the latest one.
    pub async fn add(
        &self,
        session: &Arc<SessionHandle>,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        kind: &str,
    ) -> Result<ReactionSnapshot, EventError> {
        if kind.is_empty() {
            return Err(EventError::validation("reaction type must not be empty"));
        }
        self.check_member(session, conversation_id)?;
        self.check_message_exists(message_id).await?;

        let key = keys::reaction(message_id, &session.user_id);
        let entry = match self.store.get(&key).await? {
            Some(value) => {
                let mut entry: ReactionEntry =
                    serde_json::from_value(value).map_err(StoreError::from)?;
                entry.bump(kind);
                entry
            }
            None => ReactionEntry::new(message_id.clone(), session.user_id.clone(), kind),
        };
        self.store.put(&key, serde_json::to_value(&entry)?).await?;
        metrics::counter!("reactions_total", "action" => "add").increment(1);

        let snapshot = self.snapshot(message_id).await?;
        self.broadcast_snapshot(conversation_id, message_id, &snapshot);
        Ok(snapshot)
    }

    /// Remove the caller's reaction entry outright and broadcast the
    /// updated snapshot. Removing a non-existent entry mutates nothing and
    /// broadcasts nothing.
    pub async fn remove(
        &self,
        session: &Arc<SessionHandle>,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<ReactionSnapshot, EventError> {
        self.check_member(session, conversation_id)?;
        self.check_message_exists(message_id).await?;

        let key = keys::reaction(message_id, &session.user_id);
        match self.store.delete(&key).await {
            Ok(()) => {
                metrics::counter!("reactions_total", "action" => "remove").increment(1);
                let snapshot = self.snapshot(message_id).await?;
                self.broadcast_snapshot(conversation_id, message_id, &snapshot);
                Ok(snapshot)
            }
            Err(StoreError::KeyNotFound(_)) => {
                debug!(%message_id, user_id = %session.user_id, "no reaction entry to remove");
                self.snapshot(message_id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Batch-fetch snapshots for a list of messages (late joiners).
    pub async fn fetch(
        &self,
        message_ids: &[MessageId],
    ) -> Result<HashMap<String, ReactionSnapshot>, EventError> {
        let mut out = HashMap::with_capacity(message_ids.len());
        for message_id in message_ids {
            let snapshot = self.snapshot(message_id).await?;
            let _ = out.insert(message_id.as_str().to_owned(), snapshot);
        }
        Ok(out)
    }

    /// Recompute the full snapshot for one message from the store.
    async fn snapshot(&self, message_id: &MessageId) -> Result<ReactionSnapshot, EventError> {
        let values = self
            .store
            .query_by_attribute("messageId", message_id.as_str())
            .await?;
        let entries: Vec<ReactionEntry> = values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        Ok(snapshot_from_entries(&entries))
    }

    fn broadcast_snapshot(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        snapshot: &ReactionSnapshot,
    ) {
        let _ = self.rooms.broadcast(
            conversation_id,
            &ServerEvent::new(
                server::MESSAGE_REACTION,
                json!({
                    "messageId": message_id,
                    "reactions": snapshot,
                }),
            ),
            None,
        );
    }

    fn check_member(
        &self,
        session: &Arc<SessionHandle>,
        conversation_id: &ConversationId,
    ) -> Result<(), EventError> {
        if !self.rooms.is_member(&session.id, conversation_id) {
            return Err(EventError::permission(format!(
                "session is not in conversation {conversation_id}"
            )));
        }
        Ok(())
    }

    async fn check_message_exists(&self, message_id: &MessageId) -> Result<(), EventError> {
        if self.store.get(&keys::message(message_id)).await?.is_none() {
            return Err(EventError::not_found(
                MESSAGE_NOT_FOUND,
                format!("message {message_id} does not exist"),
            ));
        }
        Ok(())
    }
}
