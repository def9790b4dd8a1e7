//! Handler for explicit presence announcements.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use parley_core::PresenceStatus;

use crate::dispatch::{EventContext, EventHandler};
use crate::errors::EventError;
use crate::handlers::parse_params;
use crate::ws::connection::SessionHandle;

#[derive(Deserialize)]
struct UserStatusParams {
    status: PresenceStatus,
}

/// `user-status` — route an explicit announcement through the same
/// transition logic as connect/disconnect; the resulting
/// `user-status-change` broadcast fires only on actual edges.
pub struct UserStatus;

#[async_trait]
impl EventHandler for UserStatus {
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError> {
        let params: UserStatusParams = parse_params(data)?;
        ctx.presence.set_status(&session.user_id, params.status);
        Ok(())
    }
}
