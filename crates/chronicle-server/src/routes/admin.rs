//! Admin endpoints: erasure, legal holds, manual retention passes.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Create the admin router. Deployment is expected to keep these routes on
/// an internal network.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/erasure", post(request_erasure))
        .route(
            "/legal-hold/:actor_id",
            post(place_hold).delete(release_hold),
        )
        .route("/retention/run", post(run_retention))
}

#[derive(Debug, Deserialize)]
struct ErasureRequest {
    actor_id: String,
}

/// Execute an actor erasure across every backend and tier. Conflicts with an
/// active legal hold return 409; the requester retries once it clears.
async fn request_erasure(
    State(state): State<AppState>,
    Json(request): Json<ErasureRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.actor_id.is_empty() {
        return Err(ApiError::BadRequest("actor_id must not be empty".into()));
    }
    let report = state.erasure.erase(&request.actor_id).await?;
    Ok(Json(report))
}

async fn place_hold(
    State(state): State<AppState>,
    Path(actor_id): Path<String>,
) -> impl IntoResponse {
    state.erasure.add_hold(&actor_id);
    StatusCode::NO_CONTENT
}

async fn release_hold(
    State(state): State<AppState>,
    Path(actor_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if state.erasure.release_hold(&actor_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("legal hold for {actor_id:?}")))
    }
}

/// Run one lifecycle pass immediately instead of waiting for the interval.
async fn run_retention(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = state.lifecycle.run_once().await?;
    Ok(Json(json!({
        "promoted_warm": report.promoted_warm,
        "promoted_cold": report.promoted_cold,
        "deleted": report.deleted,
        "purged_segments": report.purged_segments,
    })))
}
