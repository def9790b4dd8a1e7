//! Conversation fanout: message send, tombstone deletion, typing, history.
//!
//! The send path is ordered so the sender's optimistic echo stays honest:
//! persist first, acknowledge the sender, then broadcast to the rest of
//! the room. A persistence failure therefore produces no ack and no
//! broadcast — the sender gets an error frame and retracts its echo.
//! Deletion persists best-effort: a transient store failure is retried in
//! the background and the tombstone broadcast goes out regardless.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use parley_core::retry::RetryConfig;
use parley_core::{
    ChatMessage, Conversation, ConversationId, MessageId, MessageKind, SenderSnapshot, UserId,
    UserProfile,
};
use parley_store::{keys, Store};

use crate::errors::{EventError, CONVERSATION_NOT_FOUND, MESSAGE_NOT_FOUND};
use crate::events::{server, ServerEvent};
use crate::rooms::RoomRegistry;
use crate::store_retry::spawn_store_retry;
use crate::ws::connection::SessionHandle;

/// Message and typing distribution for conversation rooms.
pub struct ConversationService {
    rooms: Arc<RoomRegistry>,
    store: Arc<dyn Store>,
    retry: RetryConfig,
}

impl ConversationService {
    /// Create the service over the room registry and store.
    pub fn new(rooms: Arc<RoomRegistry>, store: Arc<dyn Store>, retry: RetryConfig) -> Self {
        Self {
            rooms,
            store,
            retry,
        }
    }

    /// Load a conversation and verify `user` may view it.
    ///
    /// Called before `RoomRegistry::join`; the room registry itself is
    /// authorization-agnostic.
    pub async fn authorize_join(
        &self,
        user: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, EventError> {
        let Some(value) = self.store.get(&keys::conversation(conversation_id)).await? else {
            return Err(EventError::not_found(
                CONVERSATION_NOT_FOUND,
                format!("conversation {conversation_id} does not exist"),
            ));
        };
        let conversation: Conversation =
            serde_json::from_value(value).map_err(parley_store::StoreError::from)?;
        if !conversation.is_participant(user) {
            return Err(EventError::permission(format!(
                "{user} is not a participant of {conversation_id}"
            )));
        }
        Ok(conversation)
    }

    /// Send a message to the sender's current room.
    ///
    /// 1. Membership check (PermissionError otherwise)
    /// 2. Persist with a sender snapshot denormalized at send time
    /// 3. `send-acknowledged` to the sender alone
    /// 4. `receive-message` to every other room member
    pub async fn send_message(
        &self,
        session: &Arc<SessionHandle>,
        conversation_id: &ConversationId,
        content: &str,
        kind: MessageKind,
    ) -> Result<ChatMessage, EventError> {
        if content.is_empty() {
            return Err(EventError::validation("content must not be empty"));
        }
        if !self.rooms.is_member(&session.id, conversation_id) {
            return Err(EventError::permission(format!(
                "session is not in conversation {conversation_id}"
            )));
        }

        let sender = self.sender_snapshot(&session.user_id).await;
        let message = ChatMessage::new(conversation_id.clone(), sender, content, kind);

        // No ack has been issued yet, so a failed write simply fails the
        // send and the client retracts its optimistic echo.
        self.store
            .put(&keys::message(&message.id), serde_json::to_value(&message)?)
            .await?;

        metrics::counter!("messages_sent_total").increment(1);
        let _ = session.send_event(&ServerEvent::new(
            server::SEND_ACKNOWLEDGED,
            json!({ "message": &message }),
        ));
        let delivered = self.rooms.broadcast(
            conversation_id,
            &ServerEvent::new(server::RECEIVE_MESSAGE, json!({ "message": &message })),
            Some(&session.id),
        );
        debug!(message_id = %message.id, %conversation_id, delivered, "message fanned out");
        Ok(message)
    }

    /// Tombstone a message and broadcast the rewrite to its room.
    ///
    /// Only the original sender may delete. The broadcast is not held back
    /// by a transient persistence failure; the write is retried in the
    /// background instead.
    pub async fn delete_message(
        &self,
        session: &Arc<SessionHandle>,
        message_id: &MessageId,
    ) -> Result<ChatMessage, EventError> {
        let key = keys::message(message_id);
        let Some(value) = self.store.get(&key).await? else {
            return Err(EventError::not_found(
                MESSAGE_NOT_FOUND,
                format!("message {message_id} does not exist"),
            ));
        };
        let mut message: ChatMessage =
            serde_json::from_value(value).map_err(parley_store::StoreError::from)?;
        if message.sender.user_id != session.user_id {
            return Err(EventError::permission(
                "only the sender may delete a message",
            ));
        }

        message.tombstone();
        match serde_json::to_value(&message) {
            Ok(tombstone) => {
                if let Err(e) = self.store.put(&key, tombstone.clone()).await {
                    warn!(%message_id, error = %e, "tombstone write failed, retrying in background");
                    let store = Arc::clone(&self.store);
                    let _handle =
                        spawn_store_retry("message_tombstone", self.retry.clone(), move || {
                            let store = Arc::clone(&store);
                            let key = key.clone();
                            let tombstone = tombstone.clone();
                            async move { store.put(&key, tombstone).await }
                        });
                }
            }
            Err(e) => warn!(%message_id, error = %e, "tombstone not serializable"),
        }

        let _ = self.rooms.broadcast(
            &message.conversation_id,
            &ServerEvent::new(server::MESSAGE_DELETED, json!({ "message": &message })),
            None,
        );
        Ok(message)
    }

    /// Message history for a room the session has open, oldest first.
    /// Tombstones are included as tombstones.
    pub async fn fetch_messages(
        &self,
        session: &Arc<SessionHandle>,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ChatMessage>, EventError> {
        if !self.rooms.is_member(&session.id, conversation_id) {
            return Err(EventError::permission(format!(
                "session is not in conversation {conversation_id}"
            )));
        }
        let values = self
            .store
            .query_by_attribute("conversationId", conversation_id.as_str())
            .await?;
        let mut messages: Vec<ChatMessage> = values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    /// Relay a typing indicator to the rest of the room. Not persisted.
    pub fn typing(
        &self,
        session: &Arc<SessionHandle>,
        conversation_id: &ConversationId,
        stopped: bool,
    ) -> Result<(), EventError> {
        if !self.rooms.is_member(&session.id, conversation_id) {
            return Err(EventError::permission(format!(
                "session is not in conversation {conversation_id}"
            )));
        }
        let name = if stopped {
            server::STOP_TYPING
        } else {
            server::TYPING
        };
        let _ = self.rooms.broadcast(
            conversation_id,
            &ServerEvent::new(
                name,
                json!({ "conversationId": conversation_id, "userId": session.user_id }),
            ),
            Some(&session.id),
        );
        Ok(())
    }

    /// Profile snapshot denormalized at send time; falls back to the bare
    /// user id when no profile record exists (or the store is down).
    async fn sender_snapshot(&self, user: &UserId) -> SenderSnapshot {
        match self.store.get(&keys::profile(user)).await {
            Ok(Some(value)) => serde_json::from_value::<UserProfile>(value)
                .map(|p| p.snapshot())
                .unwrap_or_else(|_| SenderSnapshot::bare(user.clone())),
            Ok(None) => SenderSnapshot::bare(user.clone()),
            Err(e) => {
                warn!(user_id = %user, error = %e, "profile fetch failed, using bare snapshot");
                SenderSnapshot::bare(user.clone())
            }
        }
    }
}
