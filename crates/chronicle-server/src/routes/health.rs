//! Health endpoints.

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/audit", get(audit_health))
}

/// Per-backend reachability and current buffer depth. Reports degraded (503)
/// when the primary store is unreachable, since buffered events are then one
/// crash away from the overflow log.
async fn audit_health(State(state): State<AppState>) -> impl IntoResponse {
    let backends = state.router.health().await;
    let buffer_depth = state.logger.buffer_depth();
    let worker_alive = state.logger.is_healthy();

    let healthy = backends.primary_ok && worker_alive;
    let status = if healthy && backends.all_ok() {
        "ok"
    } else if healthy {
        "degraded"
    } else {
        "unavailable"
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(json!({
            "status": status,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "buffer_depth": buffer_depth,
            "worker_alive": worker_alive,
            "backends": {
                "primary": backends.primary_ok,
                "search": backends.search_ok,
                "cache": backends.cache_ok,
            },
        })),
    )
}
