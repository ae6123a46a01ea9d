//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use tally_core::ai::AiBackend;

/// Response for the health endpoint
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_healthy: bool,
    pub ai_model: String,
}

/// GET /api/health - Liveness plus AI backend reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ai_healthy = state.ai.health_check().await;

    Json(HealthResponse {
        status: "ok",
        ai_healthy,
        ai_model: state.ai.model().to_string(),
    })
}
