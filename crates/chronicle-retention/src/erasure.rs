//! Actor erasure.

use crate::export::ColdArchive;
use crate::RetentionError;
use chrono::{DateTime, Utc};
use chronicle_backends::{Cache, EventStore, SearchIndex};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a completed erasure request.
#[derive(Debug, Clone, Serialize)]
pub struct ErasureReport {
    /// Actor whose records were removed.
    pub actor_id: String,
    /// Rows deleted from the primary store.
    pub store_deleted: u64,
    /// Documents removed from the search index.
    pub search_deleted: u64,
    /// Entries dropped from the cache.
    pub cache_deleted: u64,
    /// Whether an archive tombstone was recorded.
    pub archive_tombstoned: bool,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
}

/// Executes "delete my data" requests across every backend and tier.
///
/// Success is reported only after all configured backends confirm deletion.
/// A legal hold on the actor rejects the request with
/// [`RetentionError::Conflict`]; the requester retries once the hold clears.
pub struct ErasureCoordinator {
    store: Arc<dyn EventStore>,
    search: Option<Arc<dyn SearchIndex>>,
    cache: Option<Arc<dyn Cache>>,
    archive: Option<Arc<ColdArchive>>,
    holds: RwLock<HashSet<String>>,
}

impl ErasureCoordinator {
    /// Create a coordinator over the primary store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            search: None,
            cache: None,
            archive: None,
            holds: RwLock::new(HashSet::new()),
        }
    }

    /// Attach the search index.
    pub fn with_search(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(search);
        self
    }

    /// Attach the cache.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach the cold archive for tombstone recording.
    pub fn with_archive(mut self, archive: Arc<ColdArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Place a legal hold on an actor, blocking erasure.
    pub fn add_hold(&self, actor_id: &str) {
        self.holds.write().insert(actor_id.to_string());
        info!(actor_id, "Legal hold placed");
    }

    /// Release a legal hold. Returns whether one existed.
    pub fn release_hold(&self, actor_id: &str) -> bool {
        let released = self.holds.write().remove(actor_id);
        if released {
            info!(actor_id, "Legal hold released");
        }
        released
    }

    /// Whether an actor is under a legal hold.
    pub fn has_hold(&self, actor_id: &str) -> bool {
        self.holds.read().contains(actor_id)
    }

    /// Erase every record of an actor across all backends and tiers.
    ///
    /// Idempotent: re-running for an already-erased actor reports zero
    /// deletions and succeeds.
    pub async fn erase(&self, actor_id: &str) -> Result<ErasureReport, RetentionError> {
        if self.has_hold(actor_id) {
            warn!(actor_id, "Erasure rejected: active legal hold");
            return Err(RetentionError::Conflict(actor_id.to_string()));
        }

        let store_deleted = self.store.erase_actor(actor_id).await?;

        // Confirm before touching the secondaries; a partial primary delete
        // must not be reported as success.
        let remaining = self.store.count_actor(actor_id).await?;
        if remaining > 0 {
            return Err(RetentionError::Incomplete(format!(
                "{remaining} events remain in the primary store for {actor_id}"
            )));
        }

        let search_deleted = match &self.search {
            Some(search) => search.remove_actor(actor_id).await?,
            None => 0,
        };
        let cache_deleted = match &self.cache {
            Some(cache) => cache.remove_actor(actor_id).await?,
            None => 0,
        };
        let archive_tombstoned = match &self.archive {
            Some(archive) => {
                archive.add_tombstone(actor_id)?;
                true
            }
            None => false,
        };

        let report = ErasureReport {
            actor_id: actor_id.to_string(),
            store_deleted,
            search_deleted,
            cache_deleted,
            archive_tombstoned,
            completed_at: Utc::now(),
        };
        info!(
            actor_id,
            store_deleted, search_deleted, cache_deleted, "Erasure completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_backends::{MemoryCache, MemoryEventStore, MemorySearchIndex};
    use chronicle_types::{Actor, AuditEvent, EventType};

    fn event(actor: &str) -> AuditEvent {
        AuditEvent::builder(
            EventType::parse("data.record.created").unwrap(),
            Actor::user(actor),
        )
        .tenant("acme")
        .build()
    }

    async fn seeded() -> (Arc<MemoryEventStore>, Arc<MemorySearchIndex>, Arc<MemoryCache>) {
        let store = Arc::new(MemoryEventStore::new());
        let search = Arc::new(MemorySearchIndex::new());
        let cache = Arc::new(MemoryCache::default());
        let events = vec![event("u-1"), event("u-1"), event("u-2")];
        use chronicle_backends::{Cache as _, EventStore as _, SearchIndex as _};
        store.insert_batch(&events).await.unwrap();
        search.index_batch(&events).await.unwrap();
        cache.push_batch(&events).await.unwrap();
        (store, search, cache)
    }

    #[tokio::test]
    async fn test_erase_clears_every_backend() {
        let (store, search, cache) = seeded().await;
        let coordinator = ErasureCoordinator::new(store.clone())
            .with_search(search.clone())
            .with_cache(cache.clone());

        let report = coordinator.erase("u-1").await.unwrap();
        assert_eq!(report.store_deleted, 2);
        assert_eq!(report.search_deleted, 2);
        assert_eq!(report.cache_deleted, 2);

        use chronicle_backends::{Cache as _, EventStore as _, SearchIndex as _};
        assert_eq!(store.count_actor("u-1").await.unwrap(), 0);
        assert!(search.search("acme", "u-1", 10).await.unwrap().is_empty());
        let recent = cache.recent("acme", 10).await.unwrap();
        assert!(recent.iter().all(|e| e.actor.id != "u-1"));
    }

    #[tokio::test]
    async fn test_erase_is_idempotent() {
        let (store, _, _) = seeded().await;
        let coordinator = ErasureCoordinator::new(store);

        coordinator.erase("u-1").await.unwrap();
        let second = coordinator.erase("u-1").await.unwrap();
        assert_eq!(second.store_deleted, 0);
    }

    #[tokio::test]
    async fn test_legal_hold_blocks_erasure() {
        let (store, _, _) = seeded().await;
        let coordinator = ErasureCoordinator::new(store.clone());

        coordinator.add_hold("u-1");
        assert!(matches!(
            coordinator.erase("u-1").await,
            Err(RetentionError::Conflict(_))
        ));

        use chronicle_backends::EventStore as _;
        assert_eq!(store.count_actor("u-1").await.unwrap(), 2);

        assert!(coordinator.release_hold("u-1"));
        coordinator.erase("u-1").await.unwrap();
        assert_eq!(store.count_actor("u-1").await.unwrap(), 0);
    }
}
