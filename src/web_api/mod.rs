//! WebAPI - HTTP front-end
//!
//! ## Responsibilities
//!
//! - Health check
//! - Per-source status (last key, health, last cycle outcome)
//! - Stateless single-image prediction
//!
//! Does not touch the poll loop beyond reading its state.

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let inference_ok = state.inference.health_check().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        inference_connected: inference_ok,
    })
}
