//! Stream resolution API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;
use yarr_core::{PipelineError, StreamRequest, StreamResolution};

use super::ErrorResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    /// Service display name, e.g. "RealDebrid".
    pub service: String,
    pub magnet: String,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub service: String,
    pub url: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: PipelineError) -> ApiError {
    let status = match &err {
        PipelineError::NoSourcesConfigured
        | PipelineError::InvalidPreferences(_)
        | PipelineError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::UnknownService(_) => StatusCode::NOT_FOUND,
        PipelineError::Debrid(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Configuration(_) | PipelineError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/streams
///
/// Resolve a movie or episode into an ordered list of streams. A search that
/// finds nothing is a 200 with an empty list.
pub async fn resolve_streams(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StreamRequest>,
) -> Result<Json<StreamResolution>, ApiError> {
    state
        .resolver()
        .resolve(&request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/v1/link
///
/// Turn a magnet into a direct link through one acceleration service.
pub async fn accelerated_link(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<LinkResponse>, ApiError> {
    if !body.magnet.starts_with("magnet:?") {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "magnet must be a magnet URI".to_string(),
            }),
        ));
    }

    let link = state
        .resolver()
        .accelerated_link(&body.service, &body.magnet)
        .await
        .map_err(error_response)?;

    match link {
        Some(url) => Ok(Json(LinkResponse {
            service: body.service,
            url,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("{} has no playable file for this magnet", body.service),
            }),
        )),
    }
}
