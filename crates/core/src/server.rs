//! HTTP control server exposing the lifecycle manager.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::manager::{AppStatus, LifecycleManager, StartOutcome};

/// Shutdown signal broadcast to every long-running task.
#[derive(Debug, Clone, Copy)]
pub enum Shutdown {
    Stop,
}

/// Shared application state for the control server.
#[derive(Clone)]
struct AppState {
    /// Broadcast sender for shutdown signals, the single authority for
    /// shutdown coordination.
    shutdown_tx: broadcast::Sender<Shutdown>,
    manager: Arc<LifecycleManager>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    apps: usize,
    running: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

#[derive(Serialize)]
struct StopResponse {
    app_id: String,
    stopped: bool,
}

#[derive(Serialize)]
struct RefreshResponse {
    apps: usize,
}

#[derive(Deserialize, Default)]
struct CleanupRequest {
    #[serde(default)]
    ranges: Option<Vec<(u16, u16)>>,
}

#[derive(Serialize)]
struct CleanupResponse {
    freed: Vec<u16>,
}

/// Map a lifecycle error onto an HTTP response with a machine-readable tag.
fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AlreadyRunning { .. } | Error::NotRunning(_) => StatusCode::CONFLICT,
        Error::InvalidConfig { .. } => StatusCode::BAD_REQUEST,
        Error::NoPortsAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::PortProbe { .. } | Error::SpawnFailed { .. } | Error::CatalogLoad { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.kind(),
            message: err.to_string(),
        }),
    )
        .into_response()
}

/// Run the control server with a pre-bound listener.
/// The listener is passed in to avoid TOCTOU race conditions with port
/// allocation. Returns when a stop request or Ctrl-C arrives and every
/// tracked app has been stopped.
pub async fn run_server(
    listener: tokio::net::TcpListener,
    manager: Arc<LifecycleManager>,
) -> Result<(), String> {
    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get listener address: {e}"))?;

    info!(
        host = %local_addr.ip(),
        port = local_addr.port(),
        apps = manager.catalog().len(),
        "Starting control server."
    );

    // Create the single shutdown broadcast channel
    let (shutdown_tx, _) = broadcast::channel::<Shutdown>(16);

    start_signal_listener(shutdown_tx.clone());

    let state = AppState {
        shutdown_tx: shutdown_tx.clone(),
        manager: Arc::clone(&manager),
    };

    let api_router = Router::new()
        .route("/apps", get(list_apps))
        .route("/apps/{id}/status", get(app_status))
        .route("/apps/{id}/start", post(start_app))
        .route("/apps/{id}/stop", post(stop_app))
        .route("/config/refresh", post(refresh_config))
        .route("/config/validate", get(validate_config))
        .route("/cleanup-ports", post(cleanup_ports));

    // Internal router: health and stop live outside /api so reverse
    // proxies forwarding /api never expose them by accident.
    let internal_router = Router::new().route("/stop", get(stop_server));

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api_router)
        .nest("/_launchdeck", internal_router)
        .with_state(state);

    let mut shutdown_rx = shutdown_tx.subscribe();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            match shutdown_rx.recv().await {
                Ok(Shutdown::Stop) => {
                    debug!("Stop signal received, shutting down server.");
                    manager.shutdown().await;
                    debug!("Server shutdown complete.");
                }
                Err(_) => {
                    debug!("Shutdown channel closed.");
                }
            }
        })
        .await
        .map_err(|err| format!("Server error: {err}"))?;

    Ok(())
}

/// Relay Ctrl-C into the shutdown broadcast so the graceful path runs.
fn start_signal_listener(shutdown_tx: broadcast::Sender<Shutdown>) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {err}");
            return;
        }
        info!("Interrupt received, stopping all apps.");
        let _ = shutdown_tx.send(Shutdown::Stop);
    });
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let running = state.manager.running_count().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            apps: state.manager.catalog().len(),
            running,
        }),
    )
}

async fn list_apps(State(state): State<AppState>) -> Json<Vec<AppStatus>> {
    Json(state.manager.status_all().await)
}

async fn app_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.status(&id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn start_app(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.start_app(&id).await {
        Ok(outcome) => started_response(outcome),
        Err(err) => {
            warn!(app = %id, error = %err, "Start request failed.");
            error_response(&err)
        }
    }
}

fn started_response(outcome: StartOutcome) -> Response {
    (StatusCode::OK, Json(outcome)).into_response()
}

async fn stop_app(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.stop_app(&id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StopResponse {
                app_id: id,
                stopped: true,
            }),
        )
            .into_response(),
        Err(err) => {
            warn!(app = %id, error = %err, "Stop request failed.");
            error_response(&err)
        }
    }
}

async fn refresh_config(State(state): State<AppState>) -> Response {
    match state.manager.catalog().refresh() {
        Ok(apps) => {
            info!(apps, "Catalog reloaded.");
            (StatusCode::OK, Json(RefreshResponse { apps })).into_response()
        }
        Err(err) => {
            warn!(error = %err, "Catalog reload failed.");
            error_response(&err)
        }
    }
}

async fn validate_config(State(state): State<AppState>) -> Json<Vec<crate::config::ValidationReport>> {
    Json(state.manager.catalog().validate_all())
}

async fn cleanup_ports(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> Json<CleanupResponse> {
    let ranges = body.and_then(|Json(req)| req.ranges);
    let freed = state.manager.cleanup_ports(ranges).await;
    Json(CleanupResponse { freed })
}

async fn stop_server(State(state): State<AppState>) -> StatusCode {
    debug!("Received control server stop request.");
    let _ = state.shutdown_tx.send(Shutdown::Stop);
    StatusCode::OK
}
