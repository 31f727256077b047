//! Fan-out of drained batches to the configured backends.

use chronicle_backends::{
    Cache, CacheError, EventStore, InsertReport, SearchError, SearchIndex,
    StoreError,
};
use chronicle_types::AuditEvent;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Upper bound on any single backend write. A timed-out write is treated
    /// as a failed write.
    pub write_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-backend result of routing one batch.
///
/// The flush as a whole is successful iff the primary write succeeded;
/// secondary failures are isolated and retried independently.
#[derive(Debug)]
pub struct RouteOutcome {
    /// Primary store result.
    pub primary: Result<InsertReport, StoreError>,
    /// Search index result, if a search backend is configured.
    pub search: Option<Result<(), SearchError>>,
    /// Cache result, if a cache backend is configured.
    pub cache: Option<Result<(), CacheError>>,
}

impl RouteOutcome {
    /// Whether the flush counts as successful.
    pub fn is_durable(&self) -> bool {
        self.primary.is_ok()
    }
}

/// Reachability snapshot across backends.
#[derive(Debug, Clone)]
pub struct BackendHealth {
    pub primary_ok: bool,
    pub search_ok: Option<bool>,
    pub cache_ok: Option<bool>,
}

impl BackendHealth {
    /// All configured backends reachable.
    pub fn all_ok(&self) -> bool {
        self.primary_ok
            && self.search_ok.unwrap_or(true)
            && self.cache_ok.unwrap_or(true)
    }
}

/// Routes drained batches to the primary store and optional secondary
/// backends with independent failure handling.
#[derive(Clone)]
pub struct StorageRouter {
    primary: Arc<dyn EventStore>,
    search: Option<Arc<dyn SearchIndex>>,
    cache: Option<Arc<dyn Cache>>,
    config: RouterConfig,
}

impl StorageRouter {
    /// Create a router over a primary store.
    pub fn new(primary: Arc<dyn EventStore>, config: RouterConfig) -> Self {
        Self {
            primary,
            search: None,
            cache: None,
            config,
        }
    }

    /// Attach a search index backend.
    pub fn with_search(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(search);
        self
    }

    /// Attach a cache backend.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The primary store.
    pub fn primary(&self) -> &Arc<dyn EventStore> {
        &self.primary
    }

    /// Write a batch to every backend concurrently, isolating failures.
    pub async fn route(&self, events: &[AuditEvent]) -> RouteOutcome {
        let (primary, search, cache) = tokio::join!(
            self.write_primary(events),
            async {
                match &self.search {
                    Some(_) => Some(self.write_search(events).await),
                    None => None,
                }
            },
            async {
                match &self.cache {
                    Some(_) => Some(self.write_cache(events).await),
                    None => None,
                }
            },
        );

        if let Err(e) = &primary {
            warn!(error = %e, count = events.len(), "Primary store write failed");
        }
        if let Some(Err(e)) = &search {
            warn!(error = %e, count = events.len(), "Search index write failed");
        }
        if let Some(Err(e)) = &cache {
            warn!(error = %e, count = events.len(), "Cache write failed");
        }

        RouteOutcome {
            primary,
            search,
            cache,
        }
    }

    /// Write a batch to the primary store only.
    pub async fn write_primary(
        &self,
        events: &[AuditEvent],
    ) -> Result<InsertReport, StoreError> {
        let report = tokio::time::timeout(
            self.config.write_timeout,
            self.primary.insert_batch(events),
        )
        .await
        .map_err(|_| StoreError::Unavailable("write timed out".into()))??;
        debug!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            "Primary write"
        );
        Ok(report)
    }

    /// Write a batch to the search index only.
    pub async fn write_search(&self, events: &[AuditEvent]) -> Result<(), SearchError> {
        let Some(search) = &self.search else {
            return Ok(());
        };
        tokio::time::timeout(self.config.write_timeout, search.index_batch(events))
            .await
            .map_err(|_| SearchError::Backend("index write timed out".into()))?
    }

    /// Write a batch to the cache only.
    pub async fn write_cache(&self, events: &[AuditEvent]) -> Result<(), CacheError> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        tokio::time::timeout(self.config.write_timeout, cache.push_batch(events))
            .await
            .map_err(|_| CacheError::Backend("cache write timed out".into()))?
    }

    /// Probe reachability of every configured backend.
    pub async fn health(&self) -> BackendHealth {
        let probe_timeout = self.config.write_timeout;
        let primary_ok = tokio::time::timeout(probe_timeout, self.primary.ping())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false);
        let search_ok = match &self.search {
            Some(search) => Some(
                tokio::time::timeout(probe_timeout, search.ping())
                    .await
                    .map(|r| r.is_ok())
                    .unwrap_or(false),
            ),
            None => None,
        };
        let cache_ok = match &self.cache {
            Some(cache) => Some(
                tokio::time::timeout(probe_timeout, cache.ping())
                    .await
                    .map(|r| r.is_ok())
                    .unwrap_or(false),
            ),
            None => None,
        };
        BackendHealth {
            primary_ok,
            search_ok,
            cache_ok,
        }
    }
}
