//! PostgreSQL primary store.

use crate::store::{
    EventFilter, EventStore, InsertReport, SortOrder, StoreError, StoreResult,
    TierScanRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_types::{
    ActionStatus, ActorKind, AuditEvent, EventCategory, EventId, StorageTier,
};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::{QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

fn actor_kind_str(kind: ActorKind) -> &'static str {
    match kind {
        ActorKind::User => "user",
        ActorKind::Agent => "agent",
        ActorKind::System => "system",
    }
}

fn action_status_str(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Success => "success",
        ActionStatus::Failure => "failure",
        ActionStatus::Partial => "partial",
        ActionStatus::InProgress => "in_progress",
    }
}

/// PostgreSQL-backed [`EventStore`].
///
/// The full event lives in a JSONB `document` column; the flat columns exist
/// for indexing and lifecycle scans only.
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Connect and run pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (migrations are the caller's concern).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for health instrumentation.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn rows_to_events(rows: Vec<sqlx::postgres::PgRow>) -> StoreResult<Vec<AuditEvent>> {
        rows.into_iter()
            .map(|row| {
                let document: serde_json::Value = row.try_get("document")?;
                Ok(serde_json::from_value(document)?)
            })
            .collect()
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_batch(&self, events: &[AuditEvent]) -> StoreResult<InsertReport> {
        if events.is_empty() {
            return Ok(InsertReport::default());
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO audit_events (id, event_type, category, timestamp, \
             ingested_at, tenant_id, project_id, request_id, parent_event_id, \
             actor_kind, actor_id, target_kind, target_id, action_verb, \
             action_status, retention_days, contains_pii, tier, \
             tier_changed_at, document) ",
        );

        let mut serialization_error = None;
        qb.push_values(events.iter(), |mut b, event| {
            let document = match serde_json::to_value(event) {
                Ok(value) => value,
                Err(e) => {
                    serialization_error.get_or_insert(e);
                    serde_json::Value::Null
                }
            };
            b.push_bind(event.id.as_uuid())
                .push_bind(event.event_type.as_str().to_string())
                .push_bind(event.category().to_string())
                .push_bind(event.timestamp)
                .push_bind(event.ingested_at)
                .push_bind(event.context.tenant_id.clone())
                .push_bind(event.context.project_id.clone())
                .push_bind(event.context.request_id.clone())
                .push_bind(event.context.parent_event_id.map(|p| p.as_uuid()))
                .push_bind(actor_kind_str(event.actor.kind))
                .push_bind(event.actor.id.clone())
                .push_bind(event.target.as_ref().map(|t| t.kind.clone()))
                .push_bind(event.target.as_ref().map(|t| t.id.clone()))
                .push_bind(event.action.verb.clone())
                .push_bind(action_status_str(event.action.status))
                .push_bind(event.security_context.retention_days.map(|d| d as i32))
                .push_bind(event.security_context.contains_pii)
                .push_bind(StorageTier::Hot.to_string())
                .push_bind(event.ingested_at)
                .push_bind(document);
        });
        if let Some(e) = serialization_error {
            return Err(StoreError::Serialization(e));
        }
        qb.push(" ON CONFLICT (id) DO NOTHING");

        let result = qb.build().execute(&self.pool).await?;
        let inserted = result.rows_affected();
        let report = InsertReport {
            inserted,
            duplicates: events.len() as u64 - inserted,
        };
        debug!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            "Batch insert"
        );
        Ok(report)
    }

    async fn get(&self, id: EventId) -> StoreResult<Option<AuditEvent>> {
        let row = sqlx::query("SELECT document FROM audit_events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let document: serde_json::Value = row.try_get("document")?;
                Ok(Some(serde_json::from_value(document)?))
            }
            None => Ok(None),
        }
    }

    async fn query(&self, filter: &EventFilter) -> StoreResult<Vec<AuditEvent>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT document FROM audit_events WHERE tier <> 'cold' AND tenant_id = ",
        );
        qb.push_bind(filter.tenant_id.clone());
        if let Some(actor_id) = &filter.actor_id {
            qb.push(" AND actor_id = ").push_bind(actor_id.clone());
        }
        if let Some(target_id) = &filter.target_id {
            qb.push(" AND target_id = ").push_bind(target_id.clone());
        }
        if let Some(event_type) = &filter.event_type {
            qb.push(" AND event_type = ").push_bind(event_type.clone());
        }
        if let Some(start) = filter.start_time {
            qb.push(" AND timestamp >= ").push_bind(start);
        }
        if let Some(end) = filter.end_time {
            qb.push(" AND timestamp < ").push_bind(end);
        }
        qb.push(match filter.order {
            SortOrder::Ascending => " ORDER BY timestamp ASC",
            SortOrder::Descending => " ORDER BY timestamp DESC",
        });
        qb.push(" LIMIT ").push_bind(filter.limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Self::rows_to_events(rows)
    }

    async fn fetch_request(
        &self,
        tenant_id: &str,
        request_id: &str,
    ) -> StoreResult<Vec<AuditEvent>> {
        let rows = sqlx::query(
            "SELECT document FROM audit_events \
             WHERE tier <> 'cold' AND tenant_id = $1 AND request_id = $2 \
             ORDER BY timestamp ASC",
        )
        .bind(tenant_id)
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Self::rows_to_events(rows)
    }

    async fn fetch_by_ids(&self, ids: &[EventId]) -> StoreResult<Vec<AuditEvent>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT document FROM audit_events WHERE id = ANY($1) ORDER BY timestamp ASC",
        )
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;
        Self::rows_to_events(rows)
    }

    async fn scan_tier(
        &self,
        tier: StorageTier,
        limit: u32,
    ) -> StoreResult<Vec<TierScanRecord>> {
        let rows = sqlx::query(
            "SELECT id, category, timestamp, retention_days, tier_changed_at \
             FROM audit_events WHERE tier = $1 \
             ORDER BY tier_changed_at ASC LIMIT $2",
        )
        .bind(tier.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let category: String = row.try_get("category")?;
                let retention_days: Option<i32> = row.try_get("retention_days")?;
                Ok(TierScanRecord {
                    id: EventId::from_uuid(row.try_get("id")?),
                    category: EventCategory::from_segment(&category),
                    timestamp: row.try_get("timestamp")?,
                    retention_days: retention_days.map(|d| d as u32),
                    tier_changed_at: row.try_get("tier_changed_at")?,
                })
            })
            .collect()
    }

    async fn advance_tier(
        &self,
        ids: &[EventId],
        from: StorageTier,
        to: StorageTier,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if to <= from {
            return Ok(0);
        }
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query(
            "UPDATE audit_events SET tier = $1, tier_changed_at = $2 \
             WHERE id = ANY($3) AND tier = $4",
        )
        .bind(to.to_string())
        .bind(now)
        .bind(&uuids)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, ids: &[EventId]) -> StoreResult<u64> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM audit_events WHERE id = ANY($1)")
            .bind(&uuids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn erase_actor(&self, actor_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM audit_events WHERE actor_id = $1")
            .bind(actor_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_actor(&self, actor_id: &str) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_events WHERE actor_id = $1")
            .bind(actor_id)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn count(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_events")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
