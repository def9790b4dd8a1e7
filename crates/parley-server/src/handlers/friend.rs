//! Handlers for the friend-request event family.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use parley_core::UserId;

use crate::dispatch::{EventContext, EventHandler};
use crate::errors::EventError;
use crate::events::{server, ServerEvent};
use crate::handlers::{parse_params, require_id};
use crate::ws::connection::SessionHandle;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetParams {
    target: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequesterParams {
    requester: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendParams {
    friend: UserId,
}

/// `friend-request-send` — create the pending edge, notify the target.
pub struct SendFriendRequest;

#[async_trait]
impl EventHandler for SendFriendRequest {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: TargetParams = parse_params(data)?;
        require_id("target", params.target.as_str())?;
        let _ = ctx
            .friends
            .send_request(&session.user_id, &params.target)
            .await?;
        Ok(())
    }
}

/// `friend-request-accept` — requires the pending edge toward the caller.
pub struct AcceptFriendRequest;

#[async_trait]
impl EventHandler for AcceptFriendRequest {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: RequesterParams = parse_params(data)?;
        require_id("requester", params.requester.as_str())?;
        ctx.friends
            .accept_request(&session.user_id, &params.requester)
            .await
    }
}

/// `friend-request-reject` — clear the pending edge, notify the requester.
pub struct RejectFriendRequest;

#[async_trait]
impl EventHandler for RejectFriendRequest {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: RequesterParams = parse_params(data)?;
        require_id("requester", params.requester.as_str())?;
        ctx.friends
            .reject_request(&session.user_id, &params.requester)
            .await
    }
}

/// `friend-remove` — delete both edges; partial failures surface as one
/// failure without compensation.
pub struct RemoveFriend;

#[async_trait]
impl EventHandler for RemoveFriend {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: FriendParams = parse_params(data)?;
        require_id("friend", params.friend.as_str())?;
        ctx.friends
            .remove_friend(&session.user_id, &params.friend)
            .await
    }
}

/// `fetch-friend-requests` — reply with the caller's pending incoming list.
pub struct FetchFriendRequests;

#[async_trait]
impl EventHandler for FetchFriendRequests {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        _data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let requests = ctx.friends.pending_for(&session.user_id).await?;
        let _ = session.send_event(&ServerEvent::new(
            server::FRIEND_REQUESTS,
            json!({ "requests": requests }),
        ));
        Ok(())
    }
}
