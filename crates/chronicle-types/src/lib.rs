//! Canonical audit event types for Chronicle.
//!
//! Everything that flows through the pipeline is an [`AuditEvent`]: an
//! immutable record of a user action, agent decision, or system event.
//! This crate defines the event schema and nothing else; validation and
//! enrichment live in `chronicle-ingest`, persistence in
//! `chronicle-backends`.

mod action;
mod actor;
mod category;
mod context;
mod event;
mod id;
mod tier;

pub use action::{ActionRecord, ActionStatus};
pub use actor::{Actor, ActorKind};
pub use category::{EventCategory, EventType, EventTypeError};
pub use context::{
    AiContext, ComplianceContext, ComplianceStatus, DataDiff, EventContext,
    PerformanceContext, SecurityContext,
};
pub use event::{AuditEvent, AuditEventBuilder, Target};
pub use id::EventId;
pub use tier::StorageTier;
