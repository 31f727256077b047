//! Audit event actions and outcomes.

use serde::{Deserialize, Serialize};

/// Outcome status of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Action completed successfully.
    Success,
    /// Action failed.
    Failure,
    /// Action completed with partial results.
    Partial,
    /// Action is still running.
    InProgress,
}

impl Default for ActionStatus {
    fn default() -> Self {
        Self::Success
    }
}

/// The action an event records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Short imperative verb ("create", "delete", "invoke").
    pub verb: String,
    /// Longer free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Outcome status.
    #[serde(default)]
    pub status: ActionStatus,
    /// Error message for failed or partial actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ActionRecord {
    /// A successful action.
    pub fn succeeded(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            description: None,
            status: ActionStatus::Success,
            error_message: None,
        }
    }

    /// A failed action with an error message.
    pub fn failed(verb: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            description: None,
            status: ActionStatus::Failure,
            error_message: Some(error.into()),
        }
    }

    /// Add a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check if the action succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.status, ActionStatus::Success)
    }

    /// Check if the action failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ActionStatus::Failure)
    }
}
