//! Lifecycle manager tests over the in-memory store.

use chronicle_backends::{EventFilter, EventStore, MemoryEventStore, MemorySearchIndex, SearchIndex};
use chronicle_retention::{
    restore_segment, ColdArchive, CompressionKind, LifecycleConfig,
    LifecycleManager, PolicyTable,
};
use chronicle_types::{
    Actor, AuditEvent, EventType, SecurityContext, StorageTier,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn aged_event(event_type: &str, age_days: i64) -> AuditEvent {
    AuditEvent::builder(
        EventType::parse(event_type).unwrap(),
        Actor::user("u-1"),
    )
    .tenant("acme")
    .timestamp(Utc::now() - Duration::days(age_days))
    .build()
}

fn manager(
    store: Arc<MemoryEventStore>,
    search: Arc<MemorySearchIndex>,
    archive: Arc<ColdArchive>,
) -> LifecycleManager {
    LifecycleManager::new(store, PolicyTable::default(), LifecycleConfig::default())
        .with_search(search)
        .with_archive(archive)
}

#[tokio::test]
async fn test_fresh_events_stay_hot() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryEventStore::new());
    let search = Arc::new(MemorySearchIndex::new());
    let archive = Arc::new(ColdArchive::new(dir.path(), CompressionKind::Gzip));

    let event = aged_event("performance.api.measured", 1);
    store.insert_batch(&[event.clone()]).await.unwrap();

    let report = manager(store.clone(), search, archive).run_once().await.unwrap();
    assert_eq!(report.promoted_warm, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(store.tier_of(event.id), Some(StorageTier::Hot));
}

#[tokio::test]
async fn test_aged_event_walks_tiers_monotonically() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryEventStore::new());
    let search = Arc::new(MemorySearchIndex::new());
    let archive = Arc::new(ColdArchive::new(dir.path(), CompressionKind::Gzip));
    let manager = manager(store.clone(), search, archive.clone());

    // Performance policy is 7/30/90: at 40 days this event is overdue for
    // both hot→warm and warm→cold and catches up within one pass.
    let event = aged_event("performance.api.measured", 40);
    store.insert_batch(&[event.clone()]).await.unwrap();

    let report = manager.run_once().await.unwrap();
    assert_eq!(report.promoted_warm, 1);
    assert_eq!(report.promoted_cold, 1);
    assert_eq!(store.tier_of(event.id), Some(StorageTier::Cold));

    // Cold events leave the query surface but live on in the archive.
    let visible = store.query(&EventFilter::for_tenant("acme")).await.unwrap();
    assert!(visible.is_empty());

    let segments = archive.list_segments().unwrap();
    assert_eq!(segments.len(), 1);
    let restored = restore_segment(&archive, &segments[0]).unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].id, event.id);

    // A second pass finds nothing left to do.
    let second = manager.run_once().await.unwrap();
    assert_eq!(second.promoted_warm, 0);
    assert_eq!(second.promoted_cold, 0);
    assert_eq!(store.tier_of(event.id), Some(StorageTier::Cold));
}

#[tokio::test]
async fn test_expired_events_are_unrecoverable() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryEventStore::new());
    let search = Arc::new(MemorySearchIndex::new());
    let archive = Arc::new(ColdArchive::new(dir.path(), CompressionKind::Gzip));

    let expired = aged_event("performance.api.measured", 120);
    let fresh = aged_event("performance.api.measured", 1);
    store
        .insert_batch(&[expired.clone(), fresh.clone()])
        .await
        .unwrap();
    search
        .index_batch(&[expired.clone(), fresh.clone()])
        .await
        .unwrap();

    let report = manager(store.clone(), search.clone(), archive)
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);

    assert!(store.get(expired.id).await.unwrap().is_none());
    let visible = store.query(&EventFilter::for_tenant("acme")).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, fresh.id);
    assert!(search
        .search("acme", "measured", 10)
        .await
        .unwrap()
        .iter()
        .all(|id| *id != expired.id));
}

#[tokio::test]
async fn test_retention_override_deletes_early() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryEventStore::new());
    let search = Arc::new(MemorySearchIndex::new());
    let archive = Arc::new(ColdArchive::new(dir.path(), CompressionKind::Gzip));

    // Security policy would keep this for years; the producer asked for 5
    // days.
    let mut event = aged_event("security.access.denied", 10);
    event.security_context = SecurityContext {
        retention_days: Some(5),
        ..SecurityContext::default()
    };
    store.insert_batch(&[event.clone()]).await.unwrap();

    let report = manager(store.clone(), search, archive).run_once().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(store.get(event.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_security_events_outlast_performance_events() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryEventStore::new());
    let search = Arc::new(MemorySearchIndex::new());
    let archive = Arc::new(ColdArchive::new(dir.path(), CompressionKind::Gzip));

    let security = aged_event("security.access.denied", 40);
    let performance = aged_event("performance.api.measured", 40);
    store
        .insert_batch(&[security.clone(), performance.clone()])
        .await
        .unwrap();

    manager(store.clone(), search, archive).run_once().await.unwrap();

    // 40 days: security (90/365/2555) is still hot, performance (7/30/90)
    // has reached cold.
    assert_eq!(store.tier_of(security.id), Some(StorageTier::Hot));
    assert_eq!(store.tier_of(performance.id), Some(StorageTier::Cold));
}
