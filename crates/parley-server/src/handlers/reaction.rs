//! Handlers for reaction mutations and batch snapshot fetches.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use parley_core::{ConversationId, MessageId};

use crate::dispatch::{EventContext, EventHandler};
use crate::errors::EventError;
use crate::events::{server, ServerEvent};
use crate::handlers::{parse_params, require_id};
use crate::ws::connection::SessionHandle;

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReactionAction {
    Add,
    Remove,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactParams {
    message_id: MessageId,
    conversation_id: ConversationId,
    #[serde(rename = "type", default)]
    kind: String,
    action: ReactionAction,
}

/// `react-message` — add or remove, then broadcast the full snapshot.
pub struct ReactMessage;

#[async_trait]
impl EventHandler for ReactMessage {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: ReactParams = parse_params(data)?;
        require_id("messageId", params.message_id.as_str())?;
        require_id("conversationId", params.conversation_id.as_str())?;
        match params.action {
            ReactionAction::Add => {
                let _ = ctx
                    .reactions
                    .add(
                        session,
                        &params.conversation_id,
                        &params.message_id,
                        &params.kind,
                    )
                    .await?;
            }
            ReactionAction::Remove => {
                let _ = ctx
                    .reactions
                    .remove(session, &params.conversation_id, &params.message_id)
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchReactionsParams {
    message_ids: Vec<MessageId>,
}

/// `fetch-reactions` — batch snapshots for late joiners.
pub struct FetchReactions;

#[async_trait]
impl EventHandler for FetchReactions {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: FetchReactionsParams = parse_params(data)?;
        if params.message_ids.is_empty() {
            return Err(EventError::validation("messageIds must not be empty"));
        }
        let snapshots = ctx.reactions.fetch(&params.message_ids).await?;
        let _ = session.send_event(&ServerEvent::new(
            server::REACTION_SNAPSHOTS,
            json!({ "reactions": snapshots }),
        ));
        Ok(())
    }
}
