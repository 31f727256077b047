//! HTTP gateway tests over the in-memory backends.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chronicle_server::webhook::compute_signature;
use chronicle_server::{routes, AppState, ServerConfig, WebhookSourceConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_state(dir: &std::path::Path) -> AppState {
    let mut config = ServerConfig {
        overflow_path: dir.join("overflow.jsonl"),
        archive_dir: dir.join("archive"),
        ..ServerConfig::default()
    };
    config.webhook_sources.insert(
        "flowd".to_string(),
        WebhookSourceConfig {
            token: "flowd-token".to_string(),
            secret: Some("flowd-secret".to_string()),
            adapter: Some("orchestrator".to_string()),
        },
    );
    config.webhook_sources.insert(
        "raw".to_string(),
        WebhookSourceConfig {
            token: "raw-token".to_string(),
            secret: None,
            adapter: None,
        },
    );
    let (state, _tasks) = AppState::build(&config).await.unwrap();
    state
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let app = routes::create_router(state.clone());
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn run_payload() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "run_id": "run-42",
        "status": "completed",
        "tenant_id": "acme",
        "nodes": [
            {"node_id": "plan", "status": "completed", "model_id": "m-large"},
            {"node_id": "execute", "status": "completed", "parent_node_id": "plan"},
        ],
    }))
    .unwrap()
}

fn signed_webhook(payload: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/audit/webhook/flowd")
        .header("authorization", "Bearer flowd-token")
        .header("x-signature", compute_signature(b"flowd-secret", payload))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_vec()))
        .unwrap()
}

#[tokio::test]
async fn test_webhook_accepts_signed_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let payload = run_payload();
    let (status, body) = send(&state, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], 3);

    // Redelivery maps to the same derived ids, so nothing duplicates.
    let (status, _) = send(&state, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    state.logger.flush().await.unwrap();
    let request = Request::builder()
        .uri("/audit/events?tenant_id=acme&limit=50")
        .header("x-tenant-id", "acme")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_webhook_rejects_bad_token() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let payload = run_payload();
    let request = Request::builder()
        .method("POST")
        .uri("/audit/webhook/flowd")
        .header("authorization", "Bearer wrong-token")
        .header("x-signature", compute_signature(b"flowd-secret", &payload))
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let payload = run_payload();
    let request = Request::builder()
        .method("POST")
        .uri("/audit/webhook/flowd")
        .header("authorization", "Bearer flowd-token")
        .header("x-signature", "0".repeat(64))
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "access_denied");
}

#[tokio::test]
async fn test_webhook_missing_signature_is_forbidden_when_secret_set() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let payload = run_payload();
    let request = Request::builder()
        .method("POST")
        .uri("/audit/webhook/flowd")
        .header("authorization", "Bearer flowd-token")
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_rejects_malformed_body() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/audit/webhook/raw")
        .header("authorization", "Bearer raw-token")
        .body(Body::from("not json at all"))
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_webhook_rejects_invalid_event_shape() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    // Valid JSON, but no event_type: normalization fails the delivery.
    let request = Request::builder()
        .method("POST")
        .uri("/audit/webhook/raw")
        .header("authorization", "Bearer raw-token")
        .body(Body::from(r#"{"actor": {"kind": "user", "id": "u-1"}}"#))
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_unknown_webhook_source_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/audit/webhook/nobody")
        .header("authorization", "Bearer whatever")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_events_query_requires_tenant_scope() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let request = Request::builder()
        .uri("/audit/events")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/audit/events?tenant_id=globex")
        .header("x-tenant-id", "acme")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "access_denied");
}

#[tokio::test]
async fn test_trace_endpoint_reconstructs_forest() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let payload = run_payload();
    send(&state, signed_webhook(&payload)).await;
    state.logger.flush().await.unwrap();

    let request = Request::builder()
        .uri("/audit/trace/run-42")
        .header("x-tenant-id", "acme")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event_count"], 3);

    // One root (the run), with plan under it and execute under plan.
    let roots = body["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["event"]["event_type"], "agent.run.completed");
    let plan = &roots[0]["children"][0];
    assert_eq!(plan["event"]["event_type"], "agent.node.completed");
    assert_eq!(plan["children"][0]["event"]["event_type"], "agent.node.completed");
}

#[tokio::test]
async fn test_health_reports_backends_and_depth() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    let request = Request::builder()
        .uri("/health/audit")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backends"]["primary"], true);
    assert!(body["buffer_depth"].is_number());
}

#[tokio::test]
async fn test_erasure_flow_and_legal_hold() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;

    // Seed events for two users.
    for actor in ["u-1", "u-1", "u-2"] {
        state
            .logger
            .log(json!({
                "event_type": "data.record.created",
                "actor": {"kind": "user", "id": actor},
                "context": {"tenant_id": "acme"},
            }))
            .await
            .unwrap();
    }
    state.logger.flush().await.unwrap();

    // A legal hold blocks erasure with 409.
    let request = Request::builder()
        .method("POST")
        .uri("/admin/legal-hold/u-1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let erase = |actor: &str| {
        Request::builder()
            .method("POST")
            .uri("/admin/erasure")
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"actor_id": "{actor}"}}"#)))
            .unwrap()
    };
    let (status, body) = send(&state, erase("u-1")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    // Release the hold and erase for real.
    let request = Request::builder()
        .method("DELETE")
        .uri("/admin/legal-hold/u-1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&state, erase("u-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store_deleted"], 2);

    // The actor's events are gone; the other user's remain.
    let request = Request::builder()
        .uri("/audit/events?actor_id=u-1")
        .header("x-tenant-id", "acme")
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&state, request).await;
    assert_eq!(body["count"], 0);

    let request = Request::builder()
        .uri("/audit/events?actor_id=u-2")
        .header("x-tenant-id", "acme")
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&state, request).await;
    assert_eq!(body["count"], 1);
}
