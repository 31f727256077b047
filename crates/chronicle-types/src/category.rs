//! Event types and categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Dotted `category.subcategory.action` event type, e.g.
/// `agent.node.completed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    /// Parse and validate a dotted event type string.
    ///
    /// At least two non-empty segments are required; segments are lowercase
    /// ASCII alphanumerics plus `_` and `-`.
    pub fn parse(s: impl Into<String>) -> Result<Self, EventTypeError> {
        let s = s.into();
        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() < 2 {
            return Err(EventTypeError::TooFewSegments(s));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(EventTypeError::EmptySegment(s.clone()));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            {
                return Err(EventTypeError::InvalidSegment {
                    event_type: s.clone(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self(s))
    }

    /// The full dotted string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The high-level category (first segment).
    pub fn category(&self) -> EventCategory {
        EventCategory::from_segment(self.0.split('.').next().unwrap_or_default())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event type validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventTypeError {
    #[error("event type {0:?} needs at least two dotted segments")]
    TooFewSegments(String),
    #[error("event type {0:?} contains an empty segment")]
    EmptySegment(String),
    #[error("event type {event_type:?} has invalid segment {segment:?}")]
    InvalidSegment { event_type: String, segment: String },
}

/// High-level category for audit events, derived from the first segment of
/// the event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventCategory {
    /// AI agent activity (node execution, tool calls, decisions).
    Agent,
    /// Authentication and session events.
    Auth,
    /// Compliance checks and findings.
    Compliance,
    /// Security-relevant events (access violations, policy denials).
    Security,
    /// Data reads, writes, and exports.
    Data,
    /// System events (startup, shutdown, configuration).
    System,
    /// Performance measurements.
    Performance,
    /// Debug and diagnostic events.
    Debug,
    /// Anything that does not map to a known category.
    Unknown,
}

impl EventCategory {
    /// Map an event type's first segment to a category.
    pub fn from_segment(segment: &str) -> Self {
        use std::str::FromStr;
        Self::from_str(segment).unwrap_or(Self::Unknown)
    }

    /// Get all categories.
    pub fn all() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }

    /// Check if this category requires elevated retention.
    pub fn requires_extended_retention(&self) -> bool {
        matches!(self, Self::Auth | Self::Compliance | Self::Security)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_event_type() {
        let et = EventType::parse("agent.node.completed").unwrap();
        assert_eq!(et.as_str(), "agent.node.completed");
        assert_eq!(et.category(), EventCategory::Agent);
    }

    #[test]
    fn test_parse_rejects_single_segment() {
        assert!(EventType::parse("agent").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        assert!(EventType::parse("agent..completed").is_err());
        assert!(EventType::parse("agent.node.").is_err());
    }

    #[test]
    fn test_parse_rejects_uppercase() {
        assert!(EventType::parse("Agent.Node").is_err());
    }

    #[test]
    fn test_unknown_category_falls_back() {
        let et = EventType::parse("dashboard.widget.moved").unwrap();
        assert_eq!(et.category(), EventCategory::Unknown);
    }

    #[test]
    fn test_extended_retention_categories() {
        assert!(EventCategory::Security.requires_extended_retention());
        assert!(EventCategory::Compliance.requires_extended_retention());
        assert!(!EventCategory::Performance.requires_extended_retention());
    }
}
