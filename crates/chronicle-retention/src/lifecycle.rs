//! Periodic retention lifecycle manager.

use crate::export::ColdArchive;
use crate::policy::{PolicyTable, TierDecision};
use crate::{ArchiveError, RetentionError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chronicle_backends::{EventStore, SearchIndex, TierScanRecord};
use chronicle_types::{EventId, StorageTier};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Lifecycle manager tuning.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Time between passes.
    pub scan_interval: Duration,
    /// Maximum records considered per tier per pass.
    pub batch_limit: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(3_600),
            batch_limit: 500,
        }
    }
}

/// Counters from one lifecycle pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LifecycleReport {
    /// Records promoted hot → warm.
    pub promoted_warm: u64,
    /// Records promoted warm → cold (exported to archive first).
    pub promoted_cold: u64,
    /// Records permanently deleted.
    pub deleted: u64,
    /// Whole archive segments purged.
    pub purged_segments: u64,
}

/// Ages stored events through the tier state machine.
///
/// Runs decoupled from the write path and holds no locks that could stall
/// ingestion. Each pass is bounded by `batch_limit` per tier and selects
/// candidates by age and current tier, so an interrupted pass resumes
/// without double-processing; the per-record watermark stamped by
/// `advance_tier` keeps scans in stable order. A record overdue for several
/// transitions catches up over the passes of a single run.
pub struct LifecycleManager {
    store: Arc<dyn EventStore>,
    search: Option<Arc<dyn SearchIndex>>,
    archive: Option<Arc<ColdArchive>>,
    policy: PolicyTable,
    config: LifecycleConfig,
}

impl LifecycleManager {
    /// Create a manager over the primary store.
    pub fn new(store: Arc<dyn EventStore>, policy: PolicyTable, config: LifecycleConfig) -> Self {
        Self {
            store,
            search: None,
            archive: None,
            policy,
            config,
        }
    }

    /// Attach the search index so deletions propagate to it.
    pub fn with_search(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(search);
        self
    }

    /// Attach the cold archive for warm → cold exports.
    pub fn with_archive(mut self, archive: Arc<ColdArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Run passes on the configured interval until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.config.scan_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.scan_interval.as_secs(),
            "Retention lifecycle manager started"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(report) => debug!(?report, "Lifecycle pass complete"),
                        Err(e) => warn!(error = %e, "Lifecycle pass failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Retention lifecycle manager stopping");
                    break;
                }
            }
        }
    }

    /// Run a single pass over all tiers.
    pub async fn run_once(&self) -> Result<LifecycleReport, RetentionError> {
        let now = Utc::now();
        let mut report = LifecycleReport::default();

        // Hot pass: age into warm, or straight to deletion on a short
        // retention override.
        let (advance, delete) = self.partition(StorageTier::Hot, now).await?;
        report.deleted += self.delete_records(&delete).await?;
        report.promoted_warm += self
            .store
            .advance_tier(&advance, StorageTier::Hot, StorageTier::Warm, now)
            .await?;

        // Warm pass: export to the cold archive before the tier flip so an
        // interruption between the two re-exports instead of losing data.
        let (advance, delete) = self.partition(StorageTier::Warm, now).await?;
        report.deleted += self.delete_records(&delete).await?;
        if !advance.is_empty() {
            if let Some(archive) = &self.archive {
                self.export_cold(archive, &advance).await?;
            }
            report.promoted_cold += self
                .store
                .advance_tier(&advance, StorageTier::Warm, StorageTier::Cold, now)
                .await?;
        }

        // Cold pass: only expiry applies.
        let (_, delete) = self.partition(StorageTier::Cold, now).await?;
        report.deleted += self.delete_records(&delete).await?;

        if let Some(archive) = &self.archive {
            let archive = Arc::clone(archive);
            report.purged_segments = tokio::task::spawn_blocking(move || {
                archive.purge_expired(now)
            })
            .await
            .map_err(|e| ArchiveError::Join(e.to_string()))??;
        }

        Ok(report)
    }

    /// Scan one tier and split candidates into advance/delete sets.
    async fn partition(
        &self,
        tier: StorageTier,
        now: DateTime<Utc>,
    ) -> Result<(Vec<EventId>, Vec<EventId>), RetentionError> {
        let records = self.store.scan_tier(tier, self.config.batch_limit).await?;
        let mut advance = Vec::new();
        let mut delete = Vec::new();
        for record in records {
            match self.decide(tier, &record, now) {
                TierDecision::Advance => advance.push(record.id),
                TierDecision::Delete => delete.push(record.id),
                TierDecision::Keep => {}
            }
        }
        Ok((advance, delete))
    }

    fn decide(&self, tier: StorageTier, record: &TierScanRecord, now: DateTime<Utc>) -> TierDecision {
        let age_days = (now - record.timestamp).num_days().max(0) as u32;
        self.policy
            .decide(tier, record.category, age_days, record.retention_days)
    }

    async fn delete_records(&self, ids: &[EventId]) -> Result<u64, RetentionError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.delete(ids).await?;
        if let Some(search) = &self.search {
            search.remove(ids).await?;
        }
        debug!(count = deleted, "Expired records deleted");
        Ok(deleted)
    }

    async fn export_cold(
        &self,
        archive: &Arc<ColdArchive>,
        ids: &[EventId],
    ) -> Result<(), RetentionError> {
        let events = self.store.fetch_by_ids(ids).await?;
        if events.is_empty() {
            return Ok(());
        }
        let purge_after = events
            .iter()
            .map(|e| {
                let days =
                    self.policy
                        .effective_expire_days(e.category(), e.retention_override_days());
                e.timestamp + ChronoDuration::days(days as i64)
            })
            .max()
            .unwrap_or_else(Utc::now);

        let archive = Arc::clone(archive);
        tokio::task::spawn_blocking(move || archive.export_segment(&events, purge_after))
            .await
            .map_err(|e| ArchiveError::Join(e.to_string()))??;
        Ok(())
    }
}
