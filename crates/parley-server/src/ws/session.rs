//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use parley_core::UserId;

use crate::dispatch::handle_frame;
use crate::events::{server, ServerEvent};
use crate::server::AppState;
use crate::ws::connection::SessionHandle;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the session and notifies the presence tracker
/// 2. Sends a `connection-established` greeting with the session id
/// 3. Forwards outbound frames and periodic Ping frames to the socket
/// 4. Dispatches inbound frames through the event registry; every inbound
///    frame (data, ping or pong) refreshes the heartbeat
/// 5. Disconnects idle or cancelled (slow-consumer) sessions
/// 6. Cleans up rooms, registry, and presence on the way out
#[instrument(skip_all, fields(user_id = %user_id, session_id))]
pub async fn run_ws_session(ws: WebSocket, user_id: UserId, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) =
        mpsc::channel::<Arc<String>>(state.config.session_channel_capacity);
    let session = Arc::new(SessionHandle::new(
        user_id.clone(),
        send_tx,
        state.config.max_dropped_frames,
    ));
    let session_id = session.id.clone();
    let _ = tracing::Span::current().record("session_id", session_id.as_str());

    info!("client connected");
    counter!("ws_connections_total").increment(1);

    state.registry.register(session.clone());
    state.presence.connected(&user_id);

    let greeting = ServerEvent::new(
        server::CONNECTION_ESTABLISHED,
        json!({ "sessionId": session_id, "userId": user_id }),
    );
    if let Some(frame) = greeting.to_json() {
        let _ = ws_tx.send(Message::Text(frame.as_str().into())).await;
    }

    // Outbound forwarder with periodic Ping frames and idle detection.
    let ping_interval = Duration::from_secs(state.config.ping_interval_secs);
    let idle_timeout = Duration::from_secs(state.config.idle_timeout_secs);
    let outbound_session = session.clone();
    let outbound_cancel = session.cancel_token();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ping.tick().await;
        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if outbound_session.heartbeat_age() > idle_timeout {
                        warn!("no client activity for {idle_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Inbound loop: dispatch frames until close, error, or eviction.
    let inbound_cancel = session.cancel_token();
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = inbound_cancel.cancelled() => {
                info!("session cancelled");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        // Any frame from the client counts as a heartbeat.
        state.registry.touch(&session_id);
        state.presence.activity(&user_id);

        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_owned()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => None,
        };

        if let Some(text) = text {
            handle_frame(&text, &state.events, &session, &state.ctx).await;
        }
    }

    info!(dropped = session.dropped(), "client disconnected");
    counter!("ws_disconnections_total").increment(1);
    histogram!("ws_connection_duration_seconds")
        .record(session.connected_at.elapsed().as_secs_f64());

    outbound.abort();
    state.rooms.remove_session(&session_id);
    let _ = state.registry.unregister(&session_id);
    state.presence.disconnected(&user_id);
}
