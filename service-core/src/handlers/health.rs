//! Liveness and readiness endpoints.
//!
//! Both handlers only read the service identity, so they cannot fail and
//! never touch downstream datastores.

use crate::startup::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

pub const HEALTHY: &str = "healthy";
pub const READY: &str = "ready";

/// Liveness check: the process is up and answering.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": HEALTHY,
        "service": state.identity.name(),
    }))
}

/// Readiness check: the listener accepts traffic.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": READY,
        "service": state.identity.name(),
    }))
}
