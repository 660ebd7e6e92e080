//! Health check endpoint.
//!
//! Reports liveness and which repository this exporter observes.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Observed repository as `owner/repo`.
    pub target: String,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check handler.
///
/// A failing beat does not make the exporter unhealthy; the beat's own
/// self-metrics report that.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "repo-rhythm",
        version: env!("CARGO_PKG_VERSION"),
        target: state.target().to_string(),
    })
}
