//! Context sections attached to audit events.

use crate::EventId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where an event belongs: tenant, project, and trace linkage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Owning tenant. Every event belongs to exactly one.
    pub tenant_id: String,
    /// Project within the tenant, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Logical request/workflow-run this event is part of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Parent event forming the execution tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<EventId>,
}

impl EventContext {
    /// Context with just a tenant.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            project_id: None,
            request_id: None,
            parent_event_id: None,
        }
    }

    /// Set the request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the parent event id.
    pub fn with_parent(mut self, parent: EventId) -> Self {
        self.parent_event_id = Some(parent);
        self
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self::for_tenant("default")
    }
}

/// Before/after snapshot of a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDiff {
    /// State before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    /// State after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
    /// Changed field names, in the order they were modified.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
}

/// AI-agent execution context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiContext {
    /// Kind of agent (researcher, reviewer, orchestrator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// Model identifier used for the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Prompt tokens consumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    /// Completion tokens produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Model confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Tools invoked during the step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<String>,
    /// Wall-clock duration of the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Result status of a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// No findings.
    Green,
    /// Findings requiring review.
    Amber,
    /// Blocking findings.
    Red,
}

/// Compliance check context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceContext {
    /// Rule ids evaluated.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub checked_rules: BTreeSet<String>,
    /// Overall status.
    pub status: ComplianceStatus,
    /// Number of issues found.
    #[serde(default)]
    pub issue_count: u32,
}

/// Security attributes of the recorded data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityContext {
    /// Payload is encrypted at rest.
    pub encrypted: bool,
    /// Data classification label, if assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_classification: Option<String>,
    /// Retention override in days; absent means the category policy applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
    /// Record contains personally identifiable information.
    pub contains_pii: bool,
}

/// Performance measurements for the recorded operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceContext {
    /// End-to-end response time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Time spent in downstream calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream_call_time_ms: Option<u64>,
}
