//! Audit event identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace for ids derived from producer-supplied strings.
const EXTERNAL_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x14, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0,
    0x4f, 0xd4, 0x30, 0xc8,
]);

/// Unique identifier for an audit event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derive a stable ID from a producer-supplied string.
    ///
    /// The same input always yields the same ID, so external producers that
    /// send their own identifiers stay idempotent under retry.
    pub fn derived(external: &str) -> Self {
        Self(Uuid::new_v5(&EXTERNAL_ID_NAMESPACE, external.as_bytes()))
    }

    /// Parse from the `evt_<uuid>` display form or a bare UUID.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.strip_prefix("evt_").unwrap_or(s);
        Uuid::parse_str(raw).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt_{}", self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let id = EventId::new();
        assert_eq!(EventId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn test_derived_is_stable() {
        let a = EventId::derived("run-42/node-7");
        let b = EventId::derived("run-42/node-7");
        assert_eq!(a, b);
        assert_ne!(a, EventId::derived("run-42/node-8"));
    }
}
