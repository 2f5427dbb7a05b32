//! `RelayServer`: axum router, socket upgrade, and listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use clawboard_core::PeerId;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::bridge;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse, ReadyResponse};
use crate::metrics::WS_CONNECTIONS_REFUSED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::SessionRegistry;
use crate::websocket::router::MessageRouter;
use crate::websocket::session::run_peer_session;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    /// Connected peers and the bot slot.
    pub registry: Arc<SessionRegistry>,
    /// Inbound frame dispatch.
    pub router: Arc<MessageRouter>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown signal.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server start time.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a server with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let router = Arc::new(MessageRouter::new(
            registry.clone(),
            config.notify_bot_missing,
        ));
        Self {
            state: AppState {
                registry,
                router,
                config: Arc::new(config),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics: None,
            },
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the axum router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/bot/command", post(bridge::send_command))
            .route("/api/bot/status", get(bridge::bot_status))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve until shutdown is signalled.
    ///
    /// Returns the bound address and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let bind = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&bind).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.state.shutdown.token();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "relay server stopped with error");
            }
        });

        info!(%addr, "relay listening");
        Ok((addr, handle))
    }

    /// Connected peers and the bot slot.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.state.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    if state.registry.connection_count() >= state.config.max_connections {
        counter!(WS_CONNECTIONS_REFUSED_TOTAL).increment(1);
        warn!(
            max_connections = state.config.max_connections,
            "refusing socket upgrade at connection limit"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let peer_id = PeerId::new();
    let max_message_size = state.config.max_message_size;
    let shutdown = state.shutdown.clone();
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| {
            shutdown.track_session(run_peer_session(socket, peer_id, state))
        })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.connection_count(),
        state.registry.bot_connected(),
    ))
}

async fn ready_handler() -> Json<ReadyResponse> {
    Json(health::ready_check())
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
