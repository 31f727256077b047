//! In-memory backend implementations.
//!
//! Used by tests and single-process deployments. Scans are linear; these are
//! not built for large retained sets.

use crate::cache::{Cache, CacheError, CacheResult};
use crate::search::{SearchError, SearchIndex, SearchResult};
use crate::store::{
    EventFilter, EventStore, InsertReport, SortOrder, StoreError, StoreResult,
    TierScanRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_types::{AuditEvent, EventId, StorageTier};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
struct StoredEvent {
    event: AuditEvent,
    tier: StorageTier,
    tier_changed_at: DateTime<Utc>,
}

/// In-memory primary store.
#[derive(Default)]
pub struct MemoryEventStore {
    events: DashMap<EventId, StoredEvent>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tier of a stored event, if present.
    pub fn tier_of(&self, id: EventId) -> Option<StorageTier> {
        self.events.get(&id).map(|e| e.tier)
    }

    fn sorted(mut events: Vec<AuditEvent>, order: SortOrder) -> Vec<AuditEvent> {
        events.sort_by_key(|e| e.timestamp);
        if matches!(order, SortOrder::Descending) {
            events.reverse();
        }
        events
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_batch(&self, events: &[AuditEvent]) -> StoreResult<InsertReport> {
        let mut report = InsertReport::default();
        for event in events {
            match self.events.entry(event.id) {
                dashmap::mapref::entry::Entry::Occupied(_) => {
                    // First write wins; a retry is identical anyway.
                    report.duplicates += 1;
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(StoredEvent {
                        event: event.clone(),
                        tier: StorageTier::Hot,
                        tier_changed_at: event.ingested_at,
                    });
                    report.inserted += 1;
                }
            }
        }
        Ok(report)
    }

    async fn get(&self, id: EventId) -> StoreResult<Option<AuditEvent>> {
        Ok(self.events.get(&id).map(|e| e.event.clone()))
    }

    async fn query(&self, filter: &EventFilter) -> StoreResult<Vec<AuditEvent>> {
        let matching: Vec<AuditEvent> = self
            .events
            .iter()
            .filter(|e| e.tier.is_queryable() && filter.matches(&e.event))
            .map(|e| e.event.clone())
            .collect();
        let mut sorted = Self::sorted(matching, filter.order);
        sorted.truncate(filter.limit as usize);
        Ok(sorted)
    }

    async fn fetch_request(
        &self,
        tenant_id: &str,
        request_id: &str,
    ) -> StoreResult<Vec<AuditEvent>> {
        let matching: Vec<AuditEvent> = self
            .events
            .iter()
            .filter(|e| {
                e.tier.is_queryable()
                    && e.event.context.tenant_id == tenant_id
                    && e.event.context.request_id.as_deref() == Some(request_id)
            })
            .map(|e| e.event.clone())
            .collect();
        Ok(Self::sorted(matching, SortOrder::Ascending))
    }

    async fn fetch_by_ids(&self, ids: &[EventId]) -> StoreResult<Vec<AuditEvent>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.events.get(id).map(|e| e.event.clone()))
            .collect())
    }

    async fn scan_tier(
        &self,
        tier: StorageTier,
        limit: u32,
    ) -> StoreResult<Vec<TierScanRecord>> {
        let mut records: Vec<TierScanRecord> = self
            .events
            .iter()
            .filter(|e| e.tier == tier)
            .map(|e| TierScanRecord {
                id: e.event.id,
                category: e.event.category(),
                timestamp: e.event.timestamp,
                retention_days: e.event.security_context.retention_days,
                tier_changed_at: e.tier_changed_at,
            })
            .collect();
        records.sort_by_key(|r| r.tier_changed_at);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn advance_tier(
        &self,
        ids: &[EventId],
        from: StorageTier,
        to: StorageTier,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut moved = 0;
        for id in ids {
            if let Some(mut entry) = self.events.get_mut(id) {
                if entry.tier == from && to > from {
                    entry.tier = to;
                    entry.tier_changed_at = now;
                    moved += 1;
                }
            }
        }
        Ok(moved)
    }

    async fn delete(&self, ids: &[EventId]) -> StoreResult<u64> {
        let mut deleted = 0;
        for id in ids {
            if self.events.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn erase_actor(&self, actor_id: &str) -> StoreResult<u64> {
        let before = self.events.len();
        self.events.retain(|_, e| e.event.actor.id != actor_id);
        Ok((before - self.events.len()) as u64)
    }

    async fn count_actor(&self, actor_id: &str) -> StoreResult<u64> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.event.actor.id == actor_id)
            .count() as u64)
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.events.len() as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SearchDoc {
    tenant_id: String,
    actor_id: String,
    text: String,
}

/// In-memory substring search index.
#[derive(Default)]
pub struct MemorySearchIndex {
    docs: DashMap<EventId, SearchDoc>,
}

impl MemorySearchIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    fn document_text(event: &AuditEvent) -> String {
        let mut parts = vec![
            event.event_type.as_str().to_string(),
            event.actor.identifier(),
            event.action.verb.clone(),
        ];
        if let Some(description) = &event.action.description {
            parts.push(description.clone());
        }
        if let Some(target) = &event.target {
            parts.push(target.id.clone());
            if let Some(name) = &target.display_name {
                parts.push(name.clone());
            }
        }
        parts.join(" ").to_lowercase()
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index_batch(&self, events: &[AuditEvent]) -> SearchResult<()> {
        for event in events {
            self.docs.insert(
                event.id,
                SearchDoc {
                    tenant_id: event.context.tenant_id.clone(),
                    actor_id: event.actor.id.clone(),
                    text: Self::document_text(event),
                },
            );
        }
        Ok(())
    }

    async fn remove(&self, ids: &[EventId]) -> SearchResult<()> {
        for id in ids {
            self.docs.remove(id);
        }
        Ok(())
    }

    async fn remove_actor(&self, actor_id: &str) -> SearchResult<u64> {
        let before = self.docs.len();
        self.docs.retain(|_, doc| doc.actor_id != actor_id);
        Ok((before - self.docs.len()) as u64)
    }

    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: u32,
    ) -> SearchResult<Vec<EventId>> {
        let needle = query.to_lowercase();
        Ok(self
            .docs
            .iter()
            .filter(|doc| doc.tenant_id == tenant_id && doc.text.contains(&needle))
            .map(|doc| *doc.key())
            .take(limit as usize)
            .collect())
    }

    async fn ping(&self) -> SearchResult<()> {
        Ok(())
    }
}

/// In-memory recent-events cache with a per-tenant cap.
pub struct MemoryCache {
    tails: Mutex<HashMap<String, VecDeque<AuditEvent>>>,
    per_tenant_cap: usize,
}

impl MemoryCache {
    /// Create a cache keeping at most `per_tenant_cap` events per tenant.
    pub fn new(per_tenant_cap: usize) -> Self {
        Self {
            tails: Mutex::new(HashMap::new()),
            per_tenant_cap,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn push_batch(&self, events: &[AuditEvent]) -> CacheResult<()> {
        let mut tails = self.tails.lock();
        for event in events {
            let tail = tails
                .entry(event.context.tenant_id.clone())
                .or_default();
            tail.push_front(event.clone());
            tail.truncate(self.per_tenant_cap);
        }
        Ok(())
    }

    async fn recent(&self, tenant_id: &str, limit: u32) -> CacheResult<Vec<AuditEvent>> {
        let tails = self.tails.lock();
        Ok(tails
            .get(tenant_id)
            .map(|tail| tail.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_actor(&self, actor_id: &str) -> CacheResult<u64> {
        let mut tails = self.tails.lock();
        let mut removed = 0;
        for tail in tails.values_mut() {
            let before = tail.len();
            tail.retain(|e| e.actor.id != actor_id);
            removed += (before - tail.len()) as u64;
        }
        Ok(removed)
    }

    async fn clear(&self) -> CacheResult<()> {
        self.tails.lock().clear();
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_types::{Actor, AuditEvent, EventType};

    fn event(tenant: &str, actor: &str) -> AuditEvent {
        AuditEvent::builder(
            EventType::parse("data.record.created").unwrap(),
            Actor::user(actor),
        )
        .tenant(tenant)
        .build()
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = MemoryEventStore::new();
        let e = event("acme", "u-1");

        let first = store.insert_batch(&[e.clone()]).await.unwrap();
        assert_eq!(first.inserted, 1);
        assert_eq!(first.duplicates, 0);

        let second = store.insert_batch(&[e.clone()]).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_advance_tier_requires_expected_from() {
        let store = MemoryEventStore::new();
        let e = event("acme", "u-1");
        store.insert_batch(&[e.clone()]).await.unwrap();

        let now = Utc::now();
        let moved = store
            .advance_tier(&[e.id], StorageTier::Warm, StorageTier::Cold, now)
            .await
            .unwrap();
        assert_eq!(moved, 0, "event is still hot");

        let moved = store
            .advance_tier(&[e.id], StorageTier::Hot, StorageTier::Warm, now)
            .await
            .unwrap();
        assert_eq!(moved, 1);
        assert_eq!(store.tier_of(e.id), Some(StorageTier::Warm));
    }

    #[tokio::test]
    async fn test_cold_events_are_not_queryable() {
        let store = MemoryEventStore::new();
        let e = event("acme", "u-1");
        store.insert_batch(&[e.clone()]).await.unwrap();

        let now = Utc::now();
        store
            .advance_tier(&[e.id], StorageTier::Hot, StorageTier::Warm, now)
            .await
            .unwrap();
        store
            .advance_tier(&[e.id], StorageTier::Warm, StorageTier::Cold, now)
            .await
            .unwrap();

        let filter = EventFilter::for_tenant("acme");
        assert!(store.query(&filter).await.unwrap().is_empty());
        // Still reachable by id for archive export.
        assert_eq!(store.fetch_by_ids(&[e.id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_erase_actor_removes_everything() {
        let store = MemoryEventStore::new();
        store
            .insert_batch(&[event("acme", "u-1"), event("acme", "u-1"), event("acme", "u-2")])
            .await
            .unwrap();

        assert_eq!(store.erase_actor("u-1").await.unwrap(), 2);
        assert_eq!(store.count_actor("u-1").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cache_caps_per_tenant_tail() {
        let cache = MemoryCache::new(3);
        let events: Vec<AuditEvent> = (0..5).map(|_| event("acme", "u-1")).collect();
        cache.push_batch(&events).await.unwrap();

        let recent = cache.recent("acme", 10).await.unwrap();
        assert_eq!(recent.len(), 3);
        // Newest first.
        assert_eq!(recent[0].id, events[4].id);
    }
}
