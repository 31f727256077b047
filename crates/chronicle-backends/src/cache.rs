//! Short-term cache trait.

use async_trait::async_trait;
use chronicle_types::AuditEvent;

/// Cache operation result.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("connection error: {0}")]
    Connection(String),
}

/// Recent-events tail per tenant.
///
/// Best-effort and short-lived: used for activity feeds and simple tailing,
/// never as a source of truth.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Push a batch onto the per-tenant tails, newest first.
    async fn push_batch(&self, events: &[AuditEvent]) -> CacheResult<()>;

    /// Most recent events for a tenant, newest first.
    async fn recent(&self, tenant_id: &str, limit: u32) -> CacheResult<Vec<AuditEvent>>;

    /// Drop cached events belonging to an actor.
    async fn remove_actor(&self, actor_id: &str) -> CacheResult<u64>;

    /// Drop everything.
    async fn clear(&self) -> CacheResult<()>;

    /// Reachability check.
    async fn ping(&self) -> CacheResult<()>;
}
