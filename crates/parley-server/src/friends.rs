//! Friend request state machine with targeted notification.
//!
//! Per ordered pair (requester, target): none → pending → accepted or
//! rejected. Acceptance replaces the pending edge with a symmetric pair of
//! friend edges. All transitions are idempotent from the caller's view —
//! duplicates are conflicts, missing edges are not-found, and nothing is
//! mutated on a rejection path. Notifications reach live sessions only;
//! the durable record is what an offline party sees on their next fetch.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use parley_core::{FriendEdge, FriendRequest, UserId};
use parley_store::{keys, Store, StoreError};

use crate::errors::{EventError, FRIEND_NOT_FOUND, REQUEST_NOT_FOUND};
use crate::events::{server, ServerEvent};
use crate::registry::ConnectionRegistry;

/// Friend request transitions over the store, notifying via the registry.
pub struct FriendService {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn Store>,
}

impl FriendService {
    /// Create the service over the connection registry and store.
    pub fn new(registry: Arc<ConnectionRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// Create a pending requester→target edge and notify the target.
    ///
    /// Conflicts: self-request, already friends, duplicate pending edge.
    /// With no live target session the request is still durably recorded
    /// and surfaces on the target's next fetch.
    pub async fn send_request(
        &self,
        requester: &UserId,
        target: &UserId,
    ) -> Result<FriendRequest, EventError> {
        if requester == target {
            return Err(EventError::conflict("cannot befriend yourself"));
        }
        if self
            .store
            .get(&keys::friend_edge(requester, target))
            .await?
            .is_some()
        {
            return Err(EventError::conflict(format!(
                "{requester} and {target} are already friends"
            )));
        }
        if self
            .store
            .get(&keys::friend_request(requester, target))
            .await?
            .is_some()
        {
            return Err(EventError::conflict("request already pending"));
        }

        let request = FriendRequest::new(requester.clone(), target.clone());
        self.store
            .put(
                &keys::friend_request(requester, target),
                serde_json::to_value(&request)?,
            )
            .await?;
        metrics::counter!("friend_requests_total", "transition" => "send").increment(1);
        info!(%requester, %target, "friend request sent");

        let delivered = self.registry.send_to_user(
            target,
            &ServerEvent::new(server::FRIEND_REQUEST_RECEIVED, json!({ "request": &request })),
        );
        if delivered == 0 {
            debug!(%target, "target offline, request awaits their next fetch");
        }
        Ok(request)
    }

    /// Accept a pending requester→acceptor edge: write both friend edges,
    /// clear the pending entry, notify both parties if live.
    pub async fn accept_request(
        &self,
        acceptor: &UserId,
        requester: &UserId,
    ) -> Result<(), EventError> {
        let pending_key = keys::friend_request(requester, acceptor);
        if self.store.get(&pending_key).await?.is_none() {
            return Err(EventError::not_found(
                REQUEST_NOT_FOUND,
                format!("no pending request from {requester}"),
            ));
        }

        let (edge_ab, edge_ba) = FriendEdge::pair(requester.clone(), acceptor.clone());
        self.store
            .put(
                &keys::friend_edge(requester, acceptor),
                serde_json::to_value(&edge_ab)?,
            )
            .await?;
        self.store
            .put(
                &keys::friend_edge(acceptor, requester),
                serde_json::to_value(&edge_ba)?,
            )
            .await?;
        self.store.delete(&pending_key).await?;
        metrics::counter!("friend_requests_total", "transition" => "accept").increment(1);
        info!(%requester, %acceptor, "friend request accepted");

        let event = ServerEvent::new(
            server::FRIEND_REQUEST_ACCEPTED,
            json!({ "requester": requester, "acceptor": acceptor }),
        );
        let _ = self.registry.send_to_user(requester, &event);
        let _ = self.registry.send_to_user(acceptor, &event);
        Ok(())
    }

    /// Clear a pending requester→acceptor edge and notify the requester.
    pub async fn reject_request(
        &self,
        acceptor: &UserId,
        requester: &UserId,
    ) -> Result<(), EventError> {
        match self
            .store
            .delete(&keys::friend_request(requester, acceptor))
            .await
        {
            Ok(()) => {}
            Err(StoreError::KeyNotFound(_)) => {
                return Err(EventError::not_found(
                    REQUEST_NOT_FOUND,
                    format!("no pending request from {requester}"),
                ));
            }
            Err(e) => return Err(e.into()),
        }
        metrics::counter!("friend_requests_total", "transition" => "reject").increment(1);

        let _ = self.registry.send_to_user(
            requester,
            &ServerEvent::new(
                server::FRIEND_REQUEST_REJECTED,
                json!({ "requester": requester, "target": acceptor }),
            ),
        );
        Ok(())
    }

    /// Remove both directed friend edges as two independent deletes.
    ///
    /// A partial failure is surfaced as a single failure with no
    /// compensating rollback; the surviving edge stays until a later
    /// removal attempt succeeds.
    pub async fn remove_friend(&self, a: &UserId, b: &UserId) -> Result<(), EventError> {
        let first = self.store.delete(&keys::friend_edge(a, b)).await;
        let second = self.store.delete(&keys::friend_edge(b, a)).await;

        for result in [first, second] {
            match result {
                Ok(()) => {}
                Err(StoreError::KeyNotFound(key)) => {
                    return Err(EventError::not_found(
                        FRIEND_NOT_FOUND,
                        format!("no friend edge {key}"),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
        metrics::counter!("friend_requests_total", "transition" => "remove").increment(1);
        info!(user_a = %a, user_b = %b, "friendship removed");

        let event = ServerEvent::new(
            server::FRIEND_REMOVED,
            json!({ "userA": a, "userB": b }),
        );
        let _ = self.registry.send_to_user(a, &event);
        let _ = self.registry.send_to_user(b, &event);
        Ok(())
    }

    /// Pending incoming requests for `user`, oldest first.
    pub async fn pending_for(&self, user: &UserId) -> Result<Vec<FriendRequest>, EventError> {
        let values = self
            .store
            .query_by_attribute("target", user.as_str())
            .await?;
        let mut requests: Vec<FriendRequest> = values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(requests)
    }

    /// Whether two users are currently friends (both edges present).
    pub async fn are_friends(&self, a: &UserId, b: &UserId) -> Result<bool, EventError> {
        Ok(self.store.get(&keys::friend_edge(a, b)).await?.is_some()
            && self.store.get(&keys::friend_edge(b, a)).await?.is_some())
    }
}
