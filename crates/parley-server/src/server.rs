//! `ParleyServer` — Axum HTTP + WebSocket server assembly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parley_core::UserId;
use parley_store::Store;

use crate::config::ServerConfig;
use crate::dispatch::{EventContext, EventRegistry};
use crate::fanout::ConversationService;
use crate::friends::FriendService;
use crate::handlers;
use crate::health::{self, HealthResponse};
use crate::presence::PresenceTracker;
use crate::reactions::ReactionService;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::ws::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Room membership.
    pub rooms: Arc<RoomRegistry>,
    /// Presence tracker.
    pub presence: Arc<PresenceTracker>,
    /// Inbound-event registry.
    pub events: Arc<EventRegistry>,
    /// Component handles for dispatch.
    pub ctx: Arc<EventContext>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

/// The assembled parley server.
pub struct ParleyServer {
    state: AppState,
}

impl ParleyServer {
    /// Wire every component over the given store and register all
    /// handlers. Dependencies are injected here once; nothing reaches for
    /// globals.
    pub fn new(config: ServerConfig, store: Arc<dyn Store>, metrics: PrometheusHandle) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomRegistry::new(registry.clone()));
        let presence = Arc::new(PresenceTracker::new(
            registry.clone(),
            store.clone(),
            &config.presence,
            config.retry.clone(),
        ));
        let conversations = Arc::new(ConversationService::new(
            rooms.clone(),
            store.clone(),
            config.retry.clone(),
        ));
        let reactions = Arc::new(ReactionService::new(rooms.clone(), store.clone()));
        let friends = Arc::new(FriendService::new(registry.clone(), store));

        let mut events = EventRegistry::new();
        handlers::register_all(&mut events);

        let ctx = Arc::new(EventContext {
            registry: registry.clone(),
            rooms: rooms.clone(),
            presence: presence.clone(),
            conversations,
            reactions,
            friends,
        });

        let state = AppState {
            config,
            registry,
            rooms,
            presence,
            events: Arc::new(events),
            ctx,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        };
        Self { state }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve; also starts the presence sweeper.
    ///
    /// Returns the bound address (port 0 auto-assigns) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(std::net::SocketAddr, JoinHandle<()>)> {
        let config = &self.state.config;
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening");

        let sweep_interval = Duration::from_secs(config.presence.sweep_interval_secs);
        let _sweeper = tokio::spawn(
            self.state
                .presence
                .clone()
                .run_sweeper(sweep_interval, self.state.shutdown.token()),
        );

        let app = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                warn!(error = %e, "server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// Shared state (tests and the binary).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectQuery {
    #[serde(default)]
    user_id: String,
}

/// GET /ws — upgrade to a WebSocket session.
///
/// The user identity arrives as a query parameter; token verification is
/// the authentication boundary's job and happens before requests reach
/// this server.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
) -> Response {
    if query.user_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "userId is required").into_response();
    }
    if state.registry.session_count() >= state.config.max_connections {
        warn!("connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }
    let user_id = UserId::from(query.user_id);
    ws.on_upgrade(move |socket| run_ws_session(socket, user_id, state))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.session_count(),
        state.presence.online_count(),
    ))
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use parley_store::MemoryStore;
    use tower::ServiceExt;

    fn make_server() -> ParleyServer {
        ParleyServer::new(
            ServerConfig::default(),
            Arc::new(MemoryStore::new()),
            PrometheusBuilder::new().build_recorder().handle(),
        )
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["online_users"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_without_user_id_is_bad_request() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn every_client_event_is_registered() {
        let server = make_server();
        assert_eq!(server.state().events.events().len(), 15);
    }

    #[tokio::test]
    async fn listen_binds_auto_port_and_shuts_down() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        handle.await.unwrap();
    }
}
