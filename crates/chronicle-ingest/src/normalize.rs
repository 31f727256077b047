//! Raw event normalization.

use chrono::{DateTime, Utc};
use chronicle_types::{
    ActionRecord, Actor, ActorKind, AiContext, AuditEvent, ComplianceContext,
    DataDiff, EventContext, EventId, EventType, PerformanceContext,
    SecurityContext, Target,
};
use serde_json::Value;

/// Normalization failure.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// Required field missing or invalid. The producer must fix the event.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A present field has an unrecognized shape.
    #[error("schema error: {0}")]
    Schema(String),
}

/// Validates and enriches a loosely structured event map into a canonical
/// [`AuditEvent`].
///
/// Pure: assigns `id` (when absent) and `ingested_at` but performs no I/O;
/// storage happens downstream.
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_tenant: String,
}

impl Normalizer {
    /// Create a normalizer that assigns `default_tenant` to events without
    /// an explicit tenant.
    pub fn new(default_tenant: impl Into<String>) -> Self {
        Self {
            default_tenant: default_tenant.into(),
        }
    }

    /// Normalize a raw event map.
    pub fn normalize(&self, raw: Value) -> Result<AuditEvent, NormalizeError> {
        let map = match raw {
            Value::Object(map) => map,
            other => {
                return Err(NormalizeError::Schema(format!(
                    "event must be a JSON object, got {}",
                    type_name(&other)
                )))
            }
        };

        let event_type = map
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| NormalizeError::Validation("missing event_type".into()))?;
        let event_type = EventType::parse(event_type)
            .map_err(|e| NormalizeError::Validation(e.to_string()))?;

        let actor = self.parse_actor(map.get("actor"))?;
        let id = self.parse_id(map.get("id"))?;
        let timestamp = self.parse_timestamp(map.get("timestamp"))?;

        let target: Option<Target> = parse_section(map.get("target"), "target")?;
        let action: Option<ActionRecord> = parse_section(map.get("action"), "action")?;
        let context = self.parse_context(map.get("context"))?;
        let data_diff: Option<DataDiff> = parse_section(map.get("data_diff"), "data_diff")?;
        let mut ai_context: Option<AiContext> =
            parse_section(map.get("ai_context"), "ai_context")?;
        let compliance_context: Option<ComplianceContext> =
            parse_section(map.get("compliance_context"), "compliance_context")?;
        let security_context: Option<SecurityContext> =
            parse_section(map.get("security_context"), "security_context")?;
        let performance_context: Option<PerformanceContext> =
            parse_section(map.get("performance_context"), "performance_context")?;

        if let Some(ai) = ai_context.as_mut() {
            if let Some(score) = ai.confidence_score.as_mut() {
                *score = score.clamp(0.0, 1.0);
            }
        }

        let mut builder = AuditEvent::builder(event_type, actor).context(context);
        if let Some(id) = id {
            builder = builder.id(id);
        }
        if let Some(timestamp) = timestamp {
            builder = builder.timestamp(timestamp);
        }
        if let Some(target) = target {
            builder = builder.target(target);
        }
        if let Some(action) = action {
            builder = builder.action(action);
        }
        if let Some(diff) = data_diff {
            builder = builder.data_diff(diff);
        }
        if let Some(ai) = ai_context {
            builder = builder.ai_context(ai);
        }
        if let Some(compliance) = compliance_context {
            builder = builder.compliance_context(compliance);
        }
        if let Some(security) = security_context {
            builder = builder.security_context(security);
        }
        if let Some(perf) = performance_context {
            builder = builder.performance_context(perf);
        }

        Ok(builder.build())
    }

    fn parse_actor(&self, raw: Option<&Value>) -> Result<Actor, NormalizeError> {
        let obj = raw
            .and_then(Value::as_object)
            .ok_or_else(|| NormalizeError::Validation("missing actor".into()))?;

        // kind is the one required actor field; everything else defaults.
        let kind = obj
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| NormalizeError::Validation("missing actor.kind".into()))?;
        let _: ActorKind = serde_json::from_value(Value::String(kind.to_string()))
            .map_err(|_| NormalizeError::Schema(format!("unknown actor.kind {:?}", kind)))?;

        let mut obj = obj.clone();
        obj.entry("id")
            .or_insert_with(|| Value::String("unknown".into()));
        serde_json::from_value(Value::Object(obj))
            .map_err(|e| NormalizeError::Schema(format!("actor: {e}")))
    }

    fn parse_id(&self, raw: Option<&Value>) -> Result<Option<EventId>, NormalizeError> {
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => {
                // Producer-supplied non-UUID ids map to a stable derived id so
                // retries stay idempotent.
                Ok(Some(EventId::parse(s).unwrap_or_else(|| EventId::derived(s))))
            }
            Some(other) => Err(NormalizeError::Schema(format!(
                "id must be a string, got {}",
                type_name(other)
            ))),
        }
    }

    fn parse_timestamp(
        &self,
        raw: Option<&Value>,
    ) -> Result<Option<DateTime<Utc>>, NormalizeError> {
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| NormalizeError::Schema(format!("timestamp: {e}"))),
            Some(other) => Err(NormalizeError::Schema(format!(
                "timestamp must be an RFC 3339 string, got {}",
                type_name(other)
            ))),
        }
    }

    fn parse_context(&self, raw: Option<&Value>) -> Result<EventContext, NormalizeError> {
        match raw {
            None | Some(Value::Null) => {
                Ok(EventContext::for_tenant(self.default_tenant.clone()))
            }
            Some(value @ Value::Object(obj)) => {
                if obj.get("tenant_id").and_then(Value::as_str).is_some() {
                    serde_json::from_value(value.clone())
                        .map_err(|e| NormalizeError::Schema(format!("context: {e}")))
                } else {
                    let mut obj = obj.clone();
                    obj.insert(
                        "tenant_id".into(),
                        Value::String(self.default_tenant.clone()),
                    );
                    serde_json::from_value(Value::Object(obj))
                        .map_err(|e| NormalizeError::Schema(format!("context: {e}")))
                }
            }
            Some(other) => Err(NormalizeError::Schema(format!(
                "context must be an object, got {}",
                type_name(other)
            ))),
        }
    }
}

fn parse_section<T: serde::de::DeserializeOwned>(
    raw: Option<&Value>,
    name: &str,
) -> Result<Option<T>, NormalizeError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| NormalizeError::Schema(format!("{name}: {e}"))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
