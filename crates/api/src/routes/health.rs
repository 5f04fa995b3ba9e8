//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `local` when this process owns the inventory, `remote` otherwise.
    pub inventory: &'static str,
}

/// GET /health — returns service health.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        inventory: if state.local_inventory.is_some() {
            "local"
        } else {
            "remote"
        },
    })
}
