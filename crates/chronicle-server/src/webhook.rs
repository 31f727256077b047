//! Webhook signature verification and per-source payload adapters.

use crate::error::ApiError;
use chronicle_types::EventId;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute an HMAC-SHA256 signature for a payload, hex-encoded.
pub fn compute_signature(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an HMAC-SHA256 signature in constant time.
pub fn verify_signature(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Translates a source-specific webhook body into raw canonical event maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAdapter {
    /// The body already is a canonical event map (or an array of them).
    Passthrough,
    /// A workflow-orchestrator run summary, flattened into one run event
    /// plus one event per executed node.
    OrchestratorRun,
}

impl WebhookAdapter {
    /// Resolve an adapter by its configured name.
    pub fn by_name(name: Option<&str>) -> Result<Self, ApiError> {
        match name {
            None | Some("passthrough") => Ok(Self::Passthrough),
            Some("orchestrator") => Ok(Self::OrchestratorRun),
            Some(other) => Err(ApiError::BadRequest(format!(
                "unknown webhook adapter {other:?}"
            ))),
        }
    }

    /// Translate a request body.
    pub fn translate(&self, source: &str, body: &Value) -> Result<Vec<Value>, ApiError> {
        match self {
            Self::Passthrough => match body {
                Value::Object(_) => Ok(vec![body.clone()]),
                Value::Array(items) => Ok(items.clone()),
                _ => Err(ApiError::ValidationError(
                    "body must be an event object or an array of them".into(),
                )),
            },
            Self::OrchestratorRun => translate_orchestrator_run(source, body),
        }
    }
}

/// Flatten an orchestrator run payload into canonical event maps.
///
/// Producer ids are namespaced by source and run so retried deliveries map
/// to the same derived event ids, and node events link to their parents via
/// `parent_event_id`.
fn translate_orchestrator_run(source: &str, body: &Value) -> Result<Vec<Value>, ApiError> {
    let run_id = body
        .get("run_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::ValidationError("missing run_id".into()))?;
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("completed");
    let agent_id = body
        .get("agent_id")
        .and_then(Value::as_str)
        .unwrap_or("orchestrator");
    let tenant_id = body.get("tenant_id").and_then(Value::as_str);

    let run_external_id = format!("{source}:{run_id}");
    let run_event_id = EventId::derived(&run_external_id);

    let mut context = json!({"request_id": run_id});
    if let Some(tenant) = tenant_id {
        context["tenant_id"] = json!(tenant);
    }

    let mut run_event = json!({
        "id": run_external_id,
        "event_type": format!("agent.run.{status}"),
        "actor": {"kind": "agent", "id": agent_id},
        "context": context.clone(),
    });
    if let Some(started_at) = body.get("started_at") {
        run_event["timestamp"] = started_at.clone();
    }

    let mut events = vec![run_event];

    let nodes = match body.get("nodes") {
        None | Some(Value::Null) => &[] as &[Value],
        Some(Value::Array(nodes)) => nodes.as_slice(),
        Some(_) => {
            return Err(ApiError::ValidationError("nodes must be an array".into()))
        }
    };

    for node in nodes {
        let node_id = node
            .get("node_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::ValidationError("node missing node_id".into()))?;
        let node_status = node
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("completed");

        // Parent linkage: another node of the same run, or the run itself.
        let parent_id = match node.get("parent_node_id").and_then(Value::as_str) {
            Some(parent_node) => {
                EventId::derived(&format!("{source}:{run_id}/{parent_node}"))
            }
            None => run_event_id,
        };

        let mut node_context = context.clone();
        node_context["parent_event_id"] = json!(parent_id.as_uuid());

        let mut event = json!({
            "id": format!("{source}:{run_id}/{node_id}"),
            "event_type": format!("agent.node.{node_status}"),
            "actor": {
                "kind": "agent",
                "id": node.get("agent_id").and_then(Value::as_str).unwrap_or(agent_id),
            },
            "context": node_context,
        });
        if let Some(started_at) = node.get("started_at") {
            event["timestamp"] = started_at.clone();
        }

        let mut ai_context = serde_json::Map::new();
        if let Some(model) = node.get("model_id") {
            ai_context.insert("model_id".into(), model.clone());
        }
        if let Some(duration) = node.get("duration_ms") {
            ai_context.insert("duration_ms".into(), duration.clone());
        }
        if let Some(tools) = node.get("tool_calls") {
            ai_context.insert("tool_calls".into(), tools.clone());
        }
        if !ai_context.is_empty() {
            event["ai_context"] = Value::Object(ai_context);
        }

        events.push(event);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let secret = b"shared-secret";
        let payload = b"{\"run_id\":\"r-1\"}";
        let signature = compute_signature(secret, payload);
        assert_eq!(signature.len(), 64);
        assert!(verify_signature(secret, payload, &signature));
        assert!(!verify_signature(b"other-secret", payload, &signature));
        assert!(!verify_signature(secret, b"tampered", &signature));
        assert!(!verify_signature(secret, payload, "not-hex"));
    }

    #[test]
    fn test_passthrough_accepts_object_and_array() {
        let adapter = WebhookAdapter::Passthrough;
        let object = json!({"event_type": "data.record.created"});
        assert_eq!(adapter.translate("src", &object).unwrap().len(), 1);

        let array = json!([{"a": 1}, {"b": 2}]);
        assert_eq!(adapter.translate("src", &array).unwrap().len(), 2);

        assert!(adapter.translate("src", &json!("nope")).is_err());
    }

    #[test]
    fn test_orchestrator_run_flattens_nodes() {
        let body = json!({
            "run_id": "run-42",
            "status": "completed",
            "tenant_id": "acme",
            "nodes": [
                {"node_id": "plan", "status": "completed", "model_id": "m-large"},
                {"node_id": "execute", "status": "failed", "parent_node_id": "plan"},
            ],
        });

        let events = WebhookAdapter::OrchestratorRun
            .translate("flowd", &body)
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event_type"], "agent.run.completed");
        assert_eq!(events[1]["event_type"], "agent.node.completed");
        assert_eq!(events[2]["event_type"], "agent.node.failed");

        // The child node points at its parent node's derived id.
        let parent_of_execute = events[2]["context"]["parent_event_id"]
            .as_str()
            .unwrap()
            .to_string();
        let plan_id = EventId::derived("flowd:run-42/plan");
        assert_eq!(parent_of_execute, plan_id.as_uuid().to_string());
    }

    #[test]
    fn test_orchestrator_run_requires_run_id() {
        let err = WebhookAdapter::OrchestratorRun
            .translate("flowd", &json!({"nodes": []}))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }
}
