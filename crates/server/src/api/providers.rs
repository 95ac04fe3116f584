//! Adapter health API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use yarr_core::searcher::{HealthDashboard, HealthStatus};

use super::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub name: String,
    pub status: HealthStatus,
}

/// GET /api/v1/providers
///
/// Health of every adapter that has been queried, best success rate first.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Json<HealthDashboard> {
    Json(state.resolver().health().dashboard().await)
}

/// POST /api/v1/providers/{name}/reset
///
/// Manually mark an adapter healthy again.
pub async fn reset_provider(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ResetResponse>, (StatusCode, Json<ErrorResponse>)> {
    let health = state.resolver().health();
    if health.reset(&name).await {
        Ok(Json(ResetResponse {
            status: health.status(&name).await,
            name,
        }))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No health record for adapter: {}", name),
            }),
        ))
    }
}
