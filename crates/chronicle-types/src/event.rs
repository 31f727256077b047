//! Core audit event type.

use crate::{
    ActionRecord, Actor, AiContext, ComplianceContext, DataDiff, EventCategory,
    EventContext, EventId, EventType, PerformanceContext, SecurityContext,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Target of an audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Type of the target resource.
    pub kind: String,
    /// Resource identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Opaque resource attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Target {
    /// Create a new target.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            display_name: None,
            metadata: HashMap::new(),
        }
    }

    /// Add a display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Add a metadata attribute.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), json);
        }
        self
    }
}

/// A complete audit event.
///
/// Append-only: once durably written an event is never mutated, only moved
/// between storage tiers or deleted by retention/erasure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// Dotted event type.
    pub event_type: EventType,
    /// When the event occurred at the producer.
    pub timestamp: DateTime<Utc>,
    /// When the normalizer accepted the event. May differ from `timestamp`
    /// under retry.
    pub ingested_at: DateTime<Utc>,
    /// Who initiated the event.
    pub actor: Actor,
    /// What the event acted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// What was done and how it went.
    pub action: ActionRecord,
    /// Tenant, project, and trace linkage.
    pub context: EventContext,
    /// Before/after snapshot for mutations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_diff: Option<DataDiff>,
    /// AI-agent execution context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_context: Option<AiContext>,
    /// Compliance check context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_context: Option<ComplianceContext>,
    /// Security attributes.
    #[serde(default)]
    pub security_context: SecurityContext,
    /// Performance measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_context: Option<PerformanceContext>,
}

impl AuditEvent {
    /// Create a new event builder.
    pub fn builder(event_type: EventType, actor: Actor) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type, actor)
    }

    /// The event's high-level category.
    pub fn category(&self) -> EventCategory {
        self.event_type.category()
    }

    /// The effective retention override, if the producer set one.
    pub fn retention_override_days(&self) -> Option<u32> {
        self.security_context.retention_days
    }
}

/// Builder for constructing audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    id: Option<EventId>,
    event_type: EventType,
    timestamp: Option<DateTime<Utc>>,
    actor: Actor,
    target: Option<Target>,
    action: Option<ActionRecord>,
    context: EventContext,
    data_diff: Option<DataDiff>,
    ai_context: Option<AiContext>,
    compliance_context: Option<ComplianceContext>,
    security_context: SecurityContext,
    performance_context: Option<PerformanceContext>,
}

impl AuditEventBuilder {
    /// Create a new builder.
    pub fn new(event_type: EventType, actor: Actor) -> Self {
        Self {
            id: None,
            event_type,
            timestamp: None,
            actor,
            target: None,
            action: None,
            context: EventContext::default(),
            data_diff: None,
            ai_context: None,
            compliance_context: None,
            security_context: SecurityContext::default(),
            performance_context: None,
        }
    }

    /// Use an explicit event id instead of generating one.
    pub fn id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the occurrence timestamp (defaults to now).
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the target.
    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the action record.
    pub fn action(mut self, action: ActionRecord) -> Self {
        self.action = Some(action);
        self
    }

    /// Set the event context.
    pub fn context(mut self, context: EventContext) -> Self {
        self.context = context;
        self
    }

    /// Set the owning tenant.
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.context.tenant_id = tenant_id.into();
        self
    }

    /// Set the request id.
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    /// Set the parent event id.
    pub fn parent(mut self, parent: EventId) -> Self {
        self.context.parent_event_id = Some(parent);
        self
    }

    /// Attach a data diff.
    pub fn data_diff(mut self, diff: DataDiff) -> Self {
        self.data_diff = Some(diff);
        self
    }

    /// Attach AI context.
    pub fn ai_context(mut self, ctx: AiContext) -> Self {
        self.ai_context = Some(ctx);
        self
    }

    /// Attach compliance context.
    pub fn compliance_context(mut self, ctx: ComplianceContext) -> Self {
        self.compliance_context = Some(ctx);
        self
    }

    /// Set security attributes.
    pub fn security_context(mut self, ctx: SecurityContext) -> Self {
        self.security_context = ctx;
        self
    }

    /// Attach performance measurements.
    pub fn performance_context(mut self, ctx: PerformanceContext) -> Self {
        self.performance_context = Some(ctx);
        self
    }

    /// Build the event.
    ///
    /// The action defaults to a successful record whose verb is the last
    /// segment of the event type.
    pub fn build(self) -> AuditEvent {
        let now = Utc::now();
        let default_verb = self
            .event_type
            .as_str()
            .rsplit('.')
            .next()
            .unwrap_or("record")
            .to_string();
        AuditEvent {
            id: self.id.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or(now),
            ingested_at: now,
            actor: self.actor,
            target: self.target,
            action: self
                .action
                .unwrap_or_else(|| ActionRecord::succeeded(default_verb)),
            context: self.context,
            data_diff: self.data_diff,
            ai_context: self.ai_context,
            compliance_context: self.compliance_context,
            security_context: self.security_context,
            performance_context: self.performance_context,
            event_type: self.event_type,
        }
    }
}
