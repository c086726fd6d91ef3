//! API module for the callback receiver

pub mod error;
pub mod gate;
pub mod handlers;

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub installation_count: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
///
/// Not ready while the store cannot be read.
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let (ready, installation_count) = match state.store.list().await {
        Ok(records) => (true, records.len()),
        Err(_) => (false, 0),
    };

    Json(ReadyResponse {
        ready,
        installation_count,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS is outermost so preflight requests never reach the gate
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Lifecycle callbacks
        .route("/install_cb", post(handlers::install_cb))
        .route("/uninstall_cb", post(handlers::uninstall_cb))
        .route("/enabled_cb", post(handlers::enabled_cb))
        .route("/disabled_cb", post(handlers::disabled_cb))
        // Platform events and extension hooks
        .route("/events/webhook", post(handlers::handle_event))
        .route("/settingPage/entries", post(handlers::setting_page_entries))
        .route("/manhour/validate", post(handlers::validate_manhour))
        .route("/oauth/callback", get(handlers::oauth_callback))
        // Administrative views
        .route("/installations", get(handlers::list_installations))
        .route("/installations/{installation_id}", get(handlers::get_installation))
        // Middleware
        .layer(from_fn_with_state(state.clone(), gate::gate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
