//! Handlers for room membership, messages, history, and typing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use parley_core::{ConversationId, MessageId, MessageKind};

use crate::dispatch::{EventContext, EventHandler};
use crate::errors::EventError;
use crate::events::{server, ServerEvent};
use crate::handlers::{parse_params, require_id};
use crate::ws::connection::SessionHandle;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationParams {
    conversation_id: ConversationId,
}

/// `join-conversation` — authorize against the participant list, then
/// move the session into the room (leaving any prior room).
pub struct JoinConversation;

#[async_trait]
impl EventHandler for JoinConversation {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: ConversationParams = parse_params(data)?;
        require_id("conversationId", params.conversation_id.as_str())?;
        let _ = ctx
            .conversations
            .authorize_join(&session.user_id, &params.conversation_id)
            .await?;
        ctx.rooms.join(&session.id, &params.conversation_id);
        Ok(())
    }
}

/// `leave-conversation` — drop out of the room; unknown rooms are no-ops.
pub struct LeaveConversation;

#[async_trait]
impl EventHandler for LeaveConversation {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: ConversationParams = parse_params(data)?;
        require_id("conversationId", params.conversation_id.as_str())?;
        ctx.rooms.leave(&session.id, &params.conversation_id);
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageParams {
    conversation_id: ConversationId,
    content: String,
    #[serde(rename = "type")]
    kind: Option<MessageKind>,
}

/// `send-message` — persist, acknowledge the sender, fan out to the room.
pub struct SendMessage;

#[async_trait]
impl EventHandler for SendMessage {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: SendMessageParams = parse_params(data)?;
        require_id("conversationId", params.conversation_id.as_str())?;
        let _ = ctx
            .conversations
            .send_message(
                session,
                &params.conversation_id,
                &params.content,
                params.kind.unwrap_or(MessageKind::Text),
            )
            .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMessageParams {
    message_id: MessageId,
}

/// `delete-message` — tombstone an own message and broadcast the rewrite.
pub struct DeleteMessage;

#[async_trait]
impl EventHandler for DeleteMessage {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: DeleteMessageParams = parse_params(data)?;
        require_id("messageId", params.message_id.as_str())?;
        let _ = ctx
            .conversations
            .delete_message(session, &params.message_id)
            .await?;
        Ok(())
    }
}

/// `fetch-messages` — reply with room history, tombstones included.
pub struct FetchMessages;

#[async_trait]
impl EventHandler for FetchMessages {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: ConversationParams = parse_params(data)?;
        require_id("conversationId", params.conversation_id.as_str())?;
        let messages = ctx
            .conversations
            .fetch_messages(session, &params.conversation_id)
            .await?;
        let _ = session.send_event(&ServerEvent::new(
            server::MESSAGE_HISTORY,
            json!({
                "conversationId": params.conversation_id,
                "messages": messages,
            }),
        ));
        Ok(())
    }
}

/// `typing` / `stop-typing` — relay to the rest of the room.
pub struct Typing {
    /// Whether this instance handles the stop edge.
    pub stopped: bool,
}

#[async_trait]
impl EventHandler for Typing {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: ConversationParams = parse_params(data)?;
        require_id("conversationId", params.conversation_id.as_str())?;
        ctx.conversations
            .typing(session, &params.conversation_id, self.stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventRegistry;
    use crate::events::{client, ClientFrame};
    use crate::handlers::register_all;
    use crate::test_support::{drain_frames, TestHarness};

    fn registry() -> EventRegistry {
        let mut registry = EventRegistry::new();
        register_all(&mut registry);
        registry
    }

    async fn dispatch(
        harness: &TestHarness,
        registry: &EventRegistry,
        session: &Arc<SessionHandle>,
        event: &str,
        data: Value,
    ) {
        let frame = ClientFrame {
            event: event.into(),
            data,
        };
        registry.dispatch(session, frame, harness.ctx()).await;
    }

    #[tokio::test]
    async fn join_requires_participation() {
        let harness = TestHarness::new();
        let registry = registry();
        harness.seed_conversation("c1", &["u1", "u2"]).await;
        let (intruder, mut rx) = harness.connect("u9");

        dispatch(
            &harness,
            &registry,
            &intruder,
            client::JOIN_CONVERSATION,
            json!({"conversationId": "c1"}),
        )
        .await;

        let frames = drain_frames(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "error");
        assert_eq!(frames[0]["data"]["code"], "PERMISSION_DENIED");
        assert!(!harness.rooms.is_member(&intruder.id, &ConversationId::from("c1")));
    }

    #[tokio::test]
    async fn join_unknown_conversation_errors() {
        let harness = TestHarness::new();
        let registry = registry();
        let (s1, mut rx) = harness.connect("u1");

        dispatch(
            &harness,
            &registry,
            &s1,
            client::JOIN_CONVERSATION,
            json!({"conversationId": "ghost"}),
        )
        .await;

        let frames = drain_frames(&mut rx);
        assert_eq!(frames[0]["data"]["code"], "CONVERSATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn join_then_send_and_fetch_history() {
        let harness = TestHarness::new();
        let registry = registry();
        harness.seed_conversation("c1", &["u1", "u2"]).await;
        let (u1, mut rx1) = harness.connect("u1");
        let (u2, mut rx2) = harness.connect("u2");

        for s in [&u1, &u2] {
            dispatch(
                &harness,
                &registry,
                s,
                client::JOIN_CONVERSATION,
                json!({"conversationId": "c1"}),
            )
            .await;
        }
        let _ = drain_frames(&mut rx1);
        let _ = drain_frames(&mut rx2);

        dispatch(
            &harness,
            &registry,
            &u2,
            client::SEND_MESSAGE,
            json!({"conversationId": "c1", "content": "hello"}),
        )
        .await;

        // U1 receives, U2 is acknowledged
        let u1_frames = drain_frames(&mut rx1);
        assert_eq!(u1_frames.len(), 1);
        assert_eq!(u1_frames[0]["type"], "receive-message");
        assert_eq!(u1_frames[0]["data"]["message"]["content"], "hello");
        let u2_frames = drain_frames(&mut rx2);
        assert_eq!(u2_frames.len(), 1);
        assert_eq!(u2_frames[0]["type"], "send-acknowledged");
        assert_eq!(u2_frames[0]["data"]["message"]["content"], "hello");

        dispatch(
            &harness,
            &registry,
            &u1,
            client::FETCH_MESSAGES,
            json!({"conversationId": "c1"}),
        )
        .await;
        let history = drain_frames(&mut rx1);
        assert_eq!(history[0]["type"], "message-history");
        assert_eq!(history[0]["data"]["messages"][0]["content"], "hello");
    }

    #[tokio::test]
    async fn send_without_join_is_denied() {
        let harness = TestHarness::new();
        let registry = registry();
        harness.seed_conversation("c1", &["u1"]).await;
        let (u1, mut rx) = harness.connect("u1");

        dispatch(
            &harness,
            &registry,
            &u1,
            client::SEND_MESSAGE,
            json!({"conversationId": "c1", "content": "hi"}),
        )
        .await;

        let frames = drain_frames(&mut rx);
        assert_eq!(frames[0]["type"], "error");
        assert_eq!(frames[0]["data"]["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn missing_params_are_validation_errors() {
        let harness = TestHarness::new();
        let registry = registry();
        let (u1, mut rx) = harness.connect("u1");

        dispatch(&harness, &registry, &u1, client::SEND_MESSAGE, json!({})).await;
        let frames = drain_frames(&mut rx);
        assert_eq!(frames[0]["data"]["code"], "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn empty_conversation_id_rejected() {
        let harness = TestHarness::new();
        let registry = registry();
        let (u1, mut rx) = harness.connect("u1");

        dispatch(
            &harness,
            &registry,
            &u1,
            client::JOIN_CONVERSATION,
            json!({"conversationId": ""}),
        )
        .await;
        let frames = drain_frames(&mut rx);
        assert_eq!(frames[0]["data"]["code"], "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn leave_unknown_room_is_silent() {
        let harness = TestHarness::new();
        let registry = registry();
        let (u1, mut rx) = harness.connect("u1");

        dispatch(
            &harness,
            &registry,
            &u1,
            client::LEAVE_CONVERSATION,
            json!({"conversationId": "never-joined"}),
        )
        .await;
        assert!(drain_frames(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn switching_rooms_keeps_single_membership() {
        let harness = TestHarness::new();
        let registry = registry();
        harness.seed_conversation("c1", &["u1"]).await;
        harness.seed_conversation("c2", &["u1"]).await;
        let (u1, _rx) = harness.connect("u1");

        for room in ["c1", "c2"] {
            dispatch(
                &harness,
                &registry,
                &u1,
                client::JOIN_CONVERSATION,
                json!({"conversationId": room}),
            )
            .await;
        }

        assert!(!harness.rooms.is_member(&u1.id, &ConversationId::from("c1")));
        assert!(harness.rooms.is_member(&u1.id, &ConversationId::from("c2")));
    }

    #[tokio::test]
    async fn typing_relays_to_room_only() {
        let harness = TestHarness::new();
        let registry = registry();
        harness.seed_conversation("c1", &["u1", "u2"]).await;
        let (u1, mut rx1) = harness.connect("u1");
        let (u2, mut rx2) = harness.connect("u2");
        for s in [&u1, &u2] {
            dispatch(
                &harness,
                &registry,
                s,
                client::JOIN_CONVERSATION,
                json!({"conversationId": "c1"}),
            )
            .await;
        }
        let _ = drain_frames(&mut rx1);
        let _ = drain_frames(&mut rx2);

        dispatch(
            &harness,
            &registry,
            &u1,
            client::TYPING,
            json!({"conversationId": "c1"}),
        )
        .await;

        assert!(drain_frames(&mut rx1).is_empty());
        let frames = drain_frames(&mut rx2);
        assert_eq!(frames[0]["type"], "typing");
        assert_eq!(frames[0]["data"]["userId"], "u1");
    }

    #[tokio::test]
    async fn delete_by_non_sender_is_denied() {
        let harness = TestHarness::new();
        let registry = registry();
        harness.seed_conversation("c1", &["u1", "u2"]).await;
        let (u1, mut rx1) = harness.connect("u1");
        let (u2, mut rx2) = harness.connect("u2");
        for s in [&u1, &u2] {
            dispatch(
                &harness,
                &registry,
                s,
                client::JOIN_CONVERSATION,
                json!({"conversationId": "c1"}),
            )
            .await;
        }
        let _ = drain_frames(&mut rx1);
        let _ = drain_frames(&mut rx2);
        dispatch(
            &harness,
            &registry,
            &u1,
            client::SEND_MESSAGE,
            json!({"conversationId": "c1", "content": "mine"}),
        )
        .await;
        let ack = drain_frames(&mut rx1);
        let message_id = ack[0]["data"]["message"]["id"].as_str().unwrap().to_owned();
        let _ = drain_frames(&mut rx2);

        dispatch(
            &harness,
            &registry,
            &u2,
            client::DELETE_MESSAGE,
            json!({"messageId": message_id}),
        )
        .await;
        let frames = drain_frames(&mut rx2);
        assert_eq!(frames[0]["type"], "error");
        assert_eq!(frames[0]["data"]["code"], "PERMISSION_DENIED");
    }
}
