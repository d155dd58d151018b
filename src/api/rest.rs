// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read-only status surface. The scanner never takes instructions over HTTP,
// so every endpoint is public and side-effect free.
//
// CORS is configured permissively; the API exposes no credentials.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::AppState;

// =============================================================================
// Router construction
// =============================================================================

/// Build the status router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/signals", get(signals))
        .route("/api/v1/decisions", get(decisions))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Liveness
// =============================================================================

async fn root() -> &'static str {
    "SMC scanner is running"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Scanner state
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn signals(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_signals())
}

async fn decisions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_decisions())
}
