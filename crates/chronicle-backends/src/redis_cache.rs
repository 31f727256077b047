//! Redis recent-events cache.

use crate::cache::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use chronicle_types::AuditEvent;
use redis::AsyncCommands;
use tracing::debug;

/// Redis-backed [`Cache`] keeping a capped list per tenant.
pub struct RedisCache {
    client: redis::Client,
    prefix: String,
    per_tenant_cap: isize,
}

impl RedisCache {
    /// Create a new Redis cache with the given URL and key prefix.
    pub fn new(url: &str, prefix: &str, per_tenant_cap: usize) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            prefix: prefix.to_string(),
            per_tenant_cap: per_tenant_cap as isize,
        })
    }

    fn key(&self, tenant_id: &str) -> String {
        format!("{}:recent:{}", self.prefix, tenant_id)
    }

    async fn connection(&self) -> CacheResult<redis::aio::Connection> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn push_batch(&self, events: &[AuditEvent]) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        for event in events {
            let key = self.key(&event.context.tenant_id);
            let serialized = serde_json::to_string(event)
                .map_err(|e| CacheError::Serialization(e.to_string()))?;
            let _: () = conn
                .lpush(&key, serialized)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            let _: () = conn
                .ltrim(&key, 0, self.per_tenant_cap - 1)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
        }
        debug!(count = events.len(), "Cache push");
        Ok(())
    }

    async fn recent(&self, tenant_id: &str, limit: u32) -> CacheResult<Vec<AuditEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let key = self.key(tenant_id);
        let raw: Vec<String> = conn
            .lrange(&key, 0, limit as isize - 1)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        raw.iter()
            .map(|s| {
                serde_json::from_str(s).map_err(|e| CacheError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn remove_actor(&self, actor_id: &str) -> CacheResult<u64> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn
            .keys(format!("{}:recent:*", self.prefix))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        let mut removed = 0u64;
        for key in keys {
            let raw: Vec<String> = conn
                .lrange(&key, 0, -1)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            let kept: Vec<&String> = raw
                .iter()
                .filter(|s| {
                    serde_json::from_str::<AuditEvent>(s)
                        .map(|e| e.actor.id != actor_id)
                        .unwrap_or(false)
                })
                .collect();
            if kept.len() == raw.len() {
                continue;
            }
            removed += (raw.len() - kept.len()) as u64;

            // Rebuild the list without the actor's events.
            let _: () = conn
                .del(&key)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            for value in kept.iter().rev() {
                let _: () = conn
                    .lpush(&key, value.as_str())
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }
        }
        debug!(actor_id, removed, "Cache erase");
        Ok(removed)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn
            .keys(format!("{}:recent:*", self.prefix))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        if keys.is_empty() {
            return Ok(());
        }
        let _: () = conn
            .del(&keys)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }
}
