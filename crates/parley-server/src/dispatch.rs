//! Event registry and dispatch.
//!
//! One dispatcher routes every inbound frame to a handler keyed by event
//! name. Handlers mutate state synchronously under the component locks;
//! the only suspension points are store I/O. Failures never escape as
//! frames to other sessions — they come back to the originating session
//! as a single `error` frame.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{EventError, EVENT_NOT_FOUND, INTERNAL_ERROR, INVALID_PARAMS};
use crate::events::{server, ClientFrame, ServerEvent};
use crate::fanout::ConversationService;
use crate::friends::FriendService;
use crate::presence::PresenceTracker;
use crate::reactions::ReactionService;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomRegistry;
use crate::ws::connection::SessionHandle;

/// Shared component handles passed to every handler.
///
/// Injected at construction — no handler reaches for globals, which keeps
/// each component independently testable.
pub struct EventContext {
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Room membership.
    pub rooms: Arc<RoomRegistry>,
    /// Presence tracker.
    pub presence: Arc<PresenceTracker>,
    /// Message fanout.
    pub conversations: Arc<ConversationService>,
    /// Reaction aggregation.
    pub reactions: Arc<ReactionService>,
    /// Friend request transitions.
    pub friends: Arc<FriendService>,
}

/// Trait implemented by every inbound-event handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Execute the handler for one frame from `session`.
    async fn handle(
        &self,
        session: &Arc<SessionHandle>,
        data: Value,
        ctx: &EventContext,
    ) -> Result<(), EventError>;
}

/// Registry mapping event names to handlers.
pub struct EventRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRegistry {
    /// Maximum time a single handler is allowed to run.
    const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an event name.
    pub fn register(&mut self, event: &str, handler: impl EventHandler + 'static) {
        let _ = self.handlers.insert(event.to_owned(), Arc::new(handler));
    }

    /// Check whether an event name is registered.
    pub fn has_event(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// List all registered event names (sorted).
    pub fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch one parsed frame.
    ///
    /// Unknown events and handler failures produce an `error` frame back
    /// to the originating session; nothing is broadcast.
    pub async fn dispatch(
        &self,
        session: &Arc<SessionHandle>,
        frame: ClientFrame,
        ctx: &EventContext,
    ) {
        let event = frame.event;
        metrics::counter!("events_total", "event" => event.clone()).increment(1);

        let Some(handler) = self.handlers.get(&event) else {
            warn!(event, "unknown event");
            metrics::counter!("event_errors_total", "event" => event.clone(), "code" => EVENT_NOT_FOUND)
                .increment(1);
            let _ = session.send_event(&ServerEvent::new(
                server::ERROR,
                serde_json::json!({
                    "event": event.clone(),
                    "code": EVENT_NOT_FOUND,
                    "message": format!("unknown event '{event}'"),
                }),
            ));
            return;
        };

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(
            Self::HANDLER_TIMEOUT,
            handler.handle(session, frame.data, ctx),
        )
        .await;

        match result {
            Ok(Ok(())) => debug!(event, "event handled"),
            Ok(Err(err)) => {
                warn!(event, code = err.code(), error = %err, "event failed");
                metrics::counter!("event_errors_total", "event" => event.clone(), "code" => err.code().to_owned())
                    .increment(1);
                let _ =
                    session.send_event(&ServerEvent::new(server::ERROR, err.to_error_data(&event)));
            }
            Err(_elapsed) => {
                tracing::error!(event, "handler timed out after {:?}", Self::HANDLER_TIMEOUT);
                metrics::counter!("event_errors_total", "event" => event.clone(), "code" => "timeout")
                    .increment(1);
                let _ = session.send_event(&ServerEvent::new(
                    server::ERROR,
                    serde_json::json!({
                        "event": event.clone(),
                        "code": INTERNAL_ERROR,
                        "message": format!("handler for '{event}' timed out"),
                    }),
                ));
            }
        }

        metrics::histogram!("event_duration_seconds", "event" => event)
            .record(start.elapsed().as_secs_f64());
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an inbound text frame and dispatch it.
///
/// Malformed JSON gets an `error` frame without touching any state.
pub async fn handle_frame(
    text: &str,
    registry: &EventRegistry,
    session: &Arc<SessionHandle>,
    ctx: &EventContext,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("invalid frame received");
            let _ = session.send_event(&ServerEvent::new(
                server::ERROR,
                serde_json::json!({
                    "event": Value::Null,
                    "code": INVALID_PARAMS,
                    "message": format!("invalid JSON: {e}"),
                }),
            ));
            return;
        }
    };
    registry.dispatch(session, frame, ctx).await;
}
