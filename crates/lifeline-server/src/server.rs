//! `RelayServer` — Axum HTTP + WebSocket relay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lifeline_store::DispatchStore;

use crate::api;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::ws::registry::ConnectionRegistry;
use crate::ws::session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Persistence facade.
    pub store: DispatchStore,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Server configuration.
    pub config: ServerConfig,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    store: DispatchStore,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server over an initialized store.
    pub fn new(config: ServerConfig, store: DispatchStore) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(
            Duration::from_secs(config.heartbeat_interval_secs),
            Duration::from_secs(config.heartbeat_timeout_secs),
        ));
        Self {
            config,
            registry,
            store,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Attach an installed Prometheus recorder for the `/metrics` endpoint.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            store: self.store.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(session::ws_handler))
            .route("/api/alerts", post(api::create_alert).get(api::list_alerts))
            .route("/api/alerts/{id}", get(api::get_alert))
            .route("/api/alerts/{id}/status", patch(api::update_alert_status))
            .route("/api/alerts/{id}/resources", post(api::assign_resources))
            .route("/api/alerts/{id}/assignments", get(api::list_assignments))
            .route(
                "/api/assignments/{id}/status",
                patch(api::update_assignment_status),
            )
            .route(
                "/api/resources",
                post(api::create_resource).get(api::list_resources),
            )
            .route("/api/resources/nearby", get(api::nearby_resources))
            .route("/api/locations/{subject_id}", get(api::location_history))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address. Port 0 picks a free port; read the real
    /// one from the returned listener.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        info!(addr = %listener.local_addr()?, "relay listening");
        Ok(listener)
    }

    /// Serve until the shutdown coordinator fires, then close every
    /// connection.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let token = self.shutdown.token();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;
        self.registry.close_all().await;
        info!("relay stopped");
        Ok(())
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.connection_count().await;
    Json(health::health_check(state.start_time, connections))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => crate::metrics::render(&handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
