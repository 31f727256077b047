//! Shared application state.

use crate::config::ServerConfig;
use crate::shutdown::ShutdownCoordinator;
use crate::webhook::WebhookAdapter;
use chronicle_backends::{
    Cache, EventStore, MemoryCache, MemoryEventStore, MemorySearchIndex,
    PgEventStore, RedisCache, SearchIndex,
};
use chronicle_ingest::{
    AuditLogger, AuditLoggerConfig, BatchConfig, RouterConfig, StorageRouter,
};
use chronicle_retention::{
    ColdArchive, CompressionKind, ErasureCoordinator, LifecycleConfig,
    LifecycleManager, PolicyTable,
};
use chronicle_trace::QueryService;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// A configured webhook source with its resolved adapter.
#[derive(Clone)]
pub struct WebhookSource {
    pub token: String,
    pub secret: Option<String>,
    pub adapter: WebhookAdapter,
}

/// Handles for the background tasks owned by the server.
pub struct BackgroundTasks {
    /// The ingest worker (batch buffer + flush scheduler).
    pub ingest: JoinHandle<()>,
    /// The retention lifecycle manager.
    pub retention: JoinHandle<()>,
}

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Write-side entry point.
    pub logger: AuditLogger,
    /// Read-side entry point.
    pub query: QueryService,
    /// Erasure and legal-hold coordinator.
    pub erasure: Arc<ErasureCoordinator>,
    /// Lifecycle manager, exposed for manual admin passes.
    pub lifecycle: Arc<LifecycleManager>,
    /// Storage router, used for health probes.
    pub router: StorageRouter,
    /// Webhook sources keyed by path segment.
    pub webhooks: Arc<HashMap<String, WebhookSource>>,
    /// Shutdown coordinator.
    pub shutdown: ShutdownCoordinator,
}

impl AppState {
    /// Construct the full pipeline from configuration and spawn its
    /// background tasks.
    pub async fn build(config: &ServerConfig) -> anyhow::Result<(Self, BackgroundTasks)> {
        let store: Arc<dyn EventStore> = match &config.database_url {
            Some(url) => {
                info!("Using PostgreSQL primary store");
                Arc::new(PgEventStore::connect(url, 10).await?)
            }
            None => {
                info!("No database configured; using in-memory primary store");
                Arc::new(MemoryEventStore::new())
            }
        };
        let search: Arc<dyn SearchIndex> = Arc::new(MemorySearchIndex::new());
        let cache: Arc<dyn Cache> = match &config.redis_url {
            Some(url) => {
                info!("Using Redis recent-events cache");
                Arc::new(RedisCache::new(url, "chronicle", 100)?)
            }
            None => Arc::new(MemoryCache::default()),
        };

        let router = StorageRouter::new(Arc::clone(&store), RouterConfig::default())
            .with_search(Arc::clone(&search))
            .with_cache(Arc::clone(&cache));

        let logger_config = AuditLoggerConfig {
            queue_capacity: config.queue_capacity,
            batch: BatchConfig {
                batch_size: config.batch_size,
                batch_interval: config.batch_interval(),
            },
            max_flush_retries: config.max_flush_retries,
            overflow_path: config.overflow_path.clone(),
            default_tenant: config.default_tenant.clone(),
            ..AuditLoggerConfig::default()
        };
        let (logger, ingest) = AuditLogger::start(logger_config, router.clone());

        let archive = Arc::new(ColdArchive::new(
            &config.archive_dir,
            CompressionKind::Gzip,
        ));
        let lifecycle = Arc::new(
            LifecycleManager::new(
                Arc::clone(&store),
                PolicyTable::default(),
                LifecycleConfig {
                    scan_interval: config.retention_interval(),
                    ..LifecycleConfig::default()
                },
            )
            .with_search(Arc::clone(&search))
            .with_archive(Arc::clone(&archive)),
        );

        let shutdown = ShutdownCoordinator::new();
        let retention = tokio::spawn(Arc::clone(&lifecycle).run(shutdown.subscribe()));

        let erasure = Arc::new(
            ErasureCoordinator::new(Arc::clone(&store))
                .with_search(search)
                .with_cache(cache)
                .with_archive(archive),
        );

        let mut webhooks = HashMap::new();
        for (source, webhook) in &config.webhook_sources {
            webhooks.insert(
                source.clone(),
                WebhookSource {
                    token: webhook.token.clone(),
                    secret: webhook.secret.clone(),
                    adapter: WebhookAdapter::by_name(webhook.adapter.as_deref())
                        .map_err(|e| anyhow::anyhow!("webhook source {source:?}: {e}"))?,
                },
            );
        }

        let state = Self {
            logger,
            query: QueryService::new(store),
            erasure,
            lifecycle,
            router,
            webhooks: Arc::new(webhooks),
            shutdown,
        };
        Ok((state, BackgroundTasks { ingest, retention }))
    }
}
