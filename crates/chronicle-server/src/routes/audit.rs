//! Ingestion and query endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chronicle_backends::{EventFilter, SortOrder};
use chronicle_trace::{QueryContext, TraceNode};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Create the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook/:source", post(ingest_webhook))
        .route("/events", get(query_events))
        .route("/trace/:request_id", get(get_trace))
}

/// The authenticated tenant scope of the caller.
fn caller_tenant(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get("x-tenant-id")
        .and_then(|value| value.to_str().ok())
        .filter(|tenant| !tenant.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn ingest_webhook(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let webhook = state
        .webhooks
        .get(&source)
        .ok_or_else(|| ApiError::NotFound(format!("webhook source {source:?}")))?;

    match bearer_token(&headers) {
        Some(token) if token == webhook.token => {}
        _ => return Err(ApiError::Unauthorized),
    }

    if let Some(secret) = &webhook.secret {
        let valid = headers
            .get("x-signature")
            .and_then(|value| value.to_str().ok())
            .map(|signature| {
                crate::webhook::verify_signature(secret.as_bytes(), &body, signature)
            })
            .unwrap_or(false);
        if !valid {
            return Err(ApiError::Forbidden);
        }
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::ValidationError(format!("invalid JSON body: {e}")))?;
    let raws = webhook.adapter.translate(&source, &payload)?;
    let ids = state.logger.log_batch(raws).await?;

    debug!(source = %source, accepted = ids.len(), "Webhook delivery accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "accepted": ids.len(),
            "event_ids": ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    event_type: Option<String>,
    actor_id: Option<String>,
    target_id: Option<String>,
    tenant_id: Option<String>,
    limit: Option<u32>,
}

async fn query_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<EventsQuery>,
) -> ApiResult<impl IntoResponse> {
    let ctx = QueryContext::for_tenant(caller_tenant(&headers)?);

    let tenant_id = params.tenant_id.unwrap_or_else(|| ctx.tenant_id.clone());
    let mut filter = EventFilter::for_tenant(tenant_id)
        .with_time_range(params.start_time, params.end_time)
        .with_limit(params.limit.unwrap_or(EventFilter::DEFAULT_LIMIT))
        .with_order(SortOrder::Descending);
    if let Some(event_type) = params.event_type {
        filter = filter.with_event_type(event_type);
    }
    if let Some(actor_id) = params.actor_id {
        filter = filter.with_actor(actor_id);
    }
    if let Some(target_id) = params.target_id {
        filter = filter.with_target(target_id);
    }

    let events = state.query.query(&ctx, &filter).await?;
    Ok(Json(json!({
        "count": events.len(),
        "events": events,
    })))
}

async fn get_trace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ctx = QueryContext::for_tenant(caller_tenant(&headers)?);
    let forest = state.query.trace(&ctx, &request_id).await?;
    let total: usize = forest.iter().map(TraceNode::size).sum();
    Ok(Json(json!({
        "request_id": request_id,
        "event_count": total,
        "roots": forest,
    })))
}
