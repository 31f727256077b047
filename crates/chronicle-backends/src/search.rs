//! Secondary search index trait.

use async_trait::async_trait;
use chronicle_types::{AuditEvent, EventId};

/// Search operation result.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search index errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("index error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Secondary full-text index over audit events.
///
/// Eventually consistent with the primary store: index writes ride the same
/// router pass as the primary write but their failures are retried
/// independently and never block durability.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index a batch of events. Re-indexing an id overwrites the document.
    async fn index_batch(&self, events: &[AuditEvent]) -> SearchResult<()>;

    /// Remove documents by event id.
    async fn remove(&self, ids: &[EventId]) -> SearchResult<()>;

    /// Remove every document belonging to an actor.
    async fn remove_actor(&self, actor_id: &str) -> SearchResult<u64>;

    /// Free-text search within a tenant, returning matching event ids.
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: u32,
    ) -> SearchResult<Vec<EventId>>;

    /// Reachability check.
    async fn ping(&self) -> SearchResult<()>;
}
