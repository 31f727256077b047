//! Primary event store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_types::{AuditEvent, EventCategory, EventId, StorageTier};

/// Store operation result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Primary store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a batched insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Rows newly written.
    pub inserted: u64,
    /// Rows skipped because the id already existed (retries or collisions;
    /// first write wins either way).
    pub duplicates: u64,
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first, for trace reconstruction.
    Ascending,
    /// Newest first, for activity feeds.
    Descending,
}

/// Conjunctive point filters over stored events.
///
/// `tenant_id` is mandatory; the query layer never serves cross-tenant
/// results. Cold-tier events are excluded; they require an explicit restore.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Owning tenant.
    pub tenant_id: String,
    /// Filter by actor id.
    pub actor_id: Option<String>,
    /// Filter by target id.
    pub target_id: Option<String>,
    /// Filter by exact event type.
    pub event_type: Option<String>,
    /// Inclusive lower bound on occurrence time.
    pub start_time: Option<DateTime<Utc>>,
    /// Exclusive upper bound on occurrence time.
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum rows returned.
    pub limit: u32,
    /// Sort direction.
    pub order: SortOrder,
}

impl EventFilter {
    /// Default result cap when the caller does not specify one.
    pub const DEFAULT_LIMIT: u32 = 100;
    /// Hard cap regardless of what the caller asks for.
    pub const MAX_LIMIT: u32 = 1_000;

    /// Filter matching every queryable event of a tenant, newest first.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            actor_id: None,
            target_id: None,
            event_type: None,
            start_time: None,
            end_time: None,
            limit: Self::DEFAULT_LIMIT,
            order: SortOrder::Descending,
        }
    }

    /// Restrict to an actor.
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Restrict to a target.
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Restrict to an event type.
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Restrict to a time range.
    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// Cap results, clamped to [`Self::MAX_LIMIT`].
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.min(Self::MAX_LIMIT);
        self
    }

    /// Set the sort direction.
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether an event matches this filter.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if event.context.tenant_id != self.tenant_id {
            return false;
        }
        if let Some(actor_id) = &self.actor_id {
            if &event.actor.id != actor_id {
                return false;
            }
        }
        if let Some(target_id) = &self.target_id {
            if event.target.as_ref().map(|t| t.id.as_str()) != Some(target_id.as_str()) {
                return false;
            }
        }
        if let Some(event_type) = &self.event_type {
            if event.event_type.as_str() != event_type {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.timestamp >= end {
                return false;
            }
        }
        true
    }
}

/// Lightweight tier-scan row for the lifecycle manager.
///
/// Carries just enough for the policy decision; the full event is fetched
/// only when it needs to be exported to a cold archive.
#[derive(Debug, Clone)]
pub struct TierScanRecord {
    /// Event id.
    pub id: EventId,
    /// Event category (drives the policy table lookup).
    pub category: EventCategory,
    /// Occurrence time.
    pub timestamp: DateTime<Utc>,
    /// Producer retention override, if any.
    pub retention_days: Option<u32>,
    /// When the record last changed tier.
    pub tier_changed_at: DateTime<Utc>,
}

/// Durable, append-only primary record store.
///
/// All writes are idempotent on event id so at-least-once delivery with
/// retries yields exactly one logical record.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a batch, skipping ids that already exist.
    async fn insert_batch(&self, events: &[AuditEvent]) -> StoreResult<InsertReport>;

    /// Fetch a single event by id.
    async fn get(&self, id: EventId) -> StoreResult<Option<AuditEvent>>;

    /// Query queryable-tier events matching a filter.
    async fn query(&self, filter: &EventFilter) -> StoreResult<Vec<AuditEvent>>;

    /// Fetch all queryable events of one request, oldest first.
    async fn fetch_request(
        &self,
        tenant_id: &str,
        request_id: &str,
    ) -> StoreResult<Vec<AuditEvent>>;

    /// Fetch full events by id (any tier).
    async fn fetch_by_ids(&self, ids: &[EventId]) -> StoreResult<Vec<AuditEvent>>;

    /// Scan a tier for lifecycle candidates, oldest transition first.
    async fn scan_tier(
        &self,
        tier: StorageTier,
        limit: u32,
    ) -> StoreResult<Vec<TierScanRecord>>;

    /// Move records from one tier to the next, stamping the watermark.
    ///
    /// Only rows still in `from` are touched, so a replayed pass is a no-op.
    async fn advance_tier(
        &self,
        ids: &[EventId],
        from: StorageTier,
        to: StorageTier,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Permanently delete records by id.
    async fn delete(&self, ids: &[EventId]) -> StoreResult<u64>;

    /// Permanently delete every event of an actor, across all tiers.
    async fn erase_actor(&self, actor_id: &str) -> StoreResult<u64>;

    /// Count remaining events for an actor, across all tiers.
    async fn count_actor(&self, actor_id: &str) -> StoreResult<u64>;

    /// Total stored events.
    async fn count(&self) -> StoreResult<u64>;

    /// Reachability check.
    async fn ping(&self) -> StoreResult<()>;
}
