//! End-to-end tests of the enqueue → batch → flush → store pipeline.

use async_trait::async_trait;
use chronicle_backends::{
    EventFilter, EventStore, InsertReport, MemoryEventStore, StoreError,
    StoreResult, TierScanRecord,
};
use chronicle_ingest::{
    AuditLogger, AuditLoggerConfig, BatchConfig, IngestError, OverflowLog,
    RouterConfig, StorageRouter,
};
use chronicle_types::{Actor, AuditEvent, EventId, EventType, StorageTier};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store wrapper that records batch sizes and can fail the first N inserts.
struct FlakyStore {
    inner: MemoryEventStore,
    fail_remaining: AtomicU32,
    batch_sizes: Mutex<Vec<usize>>,
}

impl FlakyStore {
    fn new(fail_first: u32) -> Self {
        Self {
            inner: MemoryEventStore::new(),
            fail_remaining: AtomicU32::new(fail_first),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }
}

#[async_trait]
impl EventStore for FlakyStore {
    async fn insert_batch(&self, events: &[AuditEvent]) -> StoreResult<InsertReport> {
        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.batch_sizes.lock().push(events.len());
        self.inner.insert_batch(events).await
    }

    async fn get(&self, id: EventId) -> StoreResult<Option<AuditEvent>> {
        self.inner.get(id).await
    }

    async fn query(&self, filter: &EventFilter) -> StoreResult<Vec<AuditEvent>> {
        self.inner.query(filter).await
    }

    async fn fetch_request(
        &self,
        tenant_id: &str,
        request_id: &str,
    ) -> StoreResult<Vec<AuditEvent>> {
        self.inner.fetch_request(tenant_id, request_id).await
    }

    async fn fetch_by_ids(&self, ids: &[EventId]) -> StoreResult<Vec<AuditEvent>> {
        self.inner.fetch_by_ids(ids).await
    }

    async fn scan_tier(
        &self,
        tier: StorageTier,
        limit: u32,
    ) -> StoreResult<Vec<TierScanRecord>> {
        self.inner.scan_tier(tier, limit).await
    }

    async fn advance_tier(
        &self,
        ids: &[EventId],
        from: StorageTier,
        to: StorageTier,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.inner.advance_tier(ids, from, to, now).await
    }

    async fn delete(&self, ids: &[EventId]) -> StoreResult<u64> {
        self.inner.delete(ids).await
    }

    async fn erase_actor(&self, actor_id: &str) -> StoreResult<u64> {
        self.inner.erase_actor(actor_id).await
    }

    async fn count_actor(&self, actor_id: &str) -> StoreResult<u64> {
        self.inner.count_actor(actor_id).await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.inner.count().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

fn event() -> AuditEvent {
    AuditEvent::builder(
        EventType::parse("agent.node.completed").unwrap(),
        Actor::agent("planner-1"),
    )
    .tenant("acme")
    .build()
}

fn config(batch_size: usize, dir: &std::path::Path) -> AuditLoggerConfig {
    AuditLoggerConfig {
        batch: BatchConfig {
            batch_size,
            batch_interval: Duration::from_secs(5),
        },
        overflow_path: dir.join("overflow.jsonl"),
        retry_delay: Duration::from_millis(10),
        ..AuditLoggerConfig::default()
    }
}

fn start(
    store: Arc<FlakyStore>,
    config: AuditLoggerConfig,
) -> (AuditLogger, tokio::task::JoinHandle<()>) {
    let router = StorageRouter::new(store, RouterConfig::default());
    AuditLogger::start(config, router)
}

async fn wait_until(store: &FlakyStore, expected: u64) {
    for _ in 0..1_000 {
        if store.count().await.unwrap() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "store never reached {expected} events (has {})",
        store.count().await.unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn test_batch_boundary_exact_multiples() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(0));
    let (logger, worker) = start(Arc::clone(&store), config(3, dir.path()));

    for _ in 0..9 {
        logger.log_event(event()).await.unwrap();
    }
    wait_until(&store, 9).await;

    // Exactly k flushes of exactly B events, no interval flush involved.
    assert_eq!(store.batch_sizes(), vec![3, 3, 3]);

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_overfull_batch_flushes_remainder_on_interval() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(0));
    let (logger, worker) = start(Arc::clone(&store), config(100, dir.path()));

    for _ in 0..150 {
        logger.log_event(event()).await.unwrap();
    }

    // First flush is immediate on the size threshold.
    wait_until(&store, 100).await;
    assert_eq!(store.batch_sizes(), vec![100]);

    // The remaining 50 ride the interval flush.
    wait_until(&store, 150).await;
    assert_eq!(store.batch_sizes(), vec![100, 50]);

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_no_loss_on_clean_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(0));
    let (logger, worker) = start(Arc::clone(&store), config(100, dir.path()));

    for _ in 0..17 {
        logger.log_event(event()).await.unwrap();
    }
    logger.shutdown().await.unwrap();
    worker.await.unwrap();

    assert_eq!(store.count().await.unwrap(), 17);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_ids_store_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(0));
    let (logger, worker) = start(Arc::clone(&store), config(100, dir.path()));

    let e = event();
    for _ in 0..5 {
        logger.log_event(e.clone()).await.unwrap();
    }
    logger.flush().await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_is_retried_not_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(1));
    let (logger, worker) = start(Arc::clone(&store), config(4, dir.path()));

    for _ in 0..4 {
        logger.log_event(event()).await.unwrap();
    }

    // First attempt fails, batch is re-fronted, interval retry lands it.
    wait_until(&store, 4).await;
    assert_eq!(store.batch_sizes(), vec![4]);
    assert_eq!(store.count().await.unwrap(), 4);

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_divert_to_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let overflow_path = dir.path().join("overflow.jsonl");
    let store = Arc::new(FlakyStore::new(u32::MAX));
    let mut cfg = config(2, dir.path());
    cfg.max_flush_retries = 2;
    let (logger, worker) = start(Arc::clone(&store), cfg);

    logger.log_event(event()).await.unwrap();
    logger.log_event(event()).await.unwrap();

    let overflow = OverflowLog::new(&overflow_path);
    for _ in 0..1_000 {
        if overflow.read_all().await.unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(overflow.read_all().await.unwrap().len(), 2);
    assert_eq!(store.count().await.unwrap(), 0);

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_log_sync_waits_for_durability() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(0));
    let (logger, worker) = start(Arc::clone(&store), config(100, dir.path()));

    let id = logger
        .log_sync(serde_json::json!({
            "event_type": "compliance.rule.checked",
            "actor": {"kind": "system", "id": "policy-engine"},
            "context": {"tenant_id": "acme"},
        }))
        .await
        .unwrap();

    // Durable before log_sync returned, well under the batch threshold.
    assert!(store.get(id).await.unwrap().is_some());

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_log_sync_surfaces_exhausted_retries() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(u32::MAX));
    let mut cfg = config(100, dir.path());
    cfg.max_flush_retries = 1;
    let (logger, worker) = start(Arc::clone(&store), cfg);

    let err = logger
        .log_sync(serde_json::json!({
            "event_type": "compliance.rule.checked",
            "actor": {"kind": "system", "id": "policy-engine"},
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::RetriesExhausted));

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_event_rejected_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::new(0));
    let (logger, worker) = start(Arc::clone(&store), config(100, dir.path()));

    let err = logger
        .log(serde_json::json!({"actor": {"kind": "user", "id": "u-1"}}))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Normalize(_)));
    assert_eq!(store.count().await.unwrap(), 0);

    logger.shutdown().await.unwrap();
    worker.await.unwrap();
}
