//! Server configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8085
}

/// Authentication settings for one webhook source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    /// Bearer token the producer must present.
    pub token: String,
    /// Shared secret for HMAC-SHA256 body signatures. When set, deliveries
    /// without a valid `X-Signature` are rejected.
    #[serde(default)]
    pub secret: Option<String>,
    /// Payload adapter: "passthrough" (default) or "orchestrator".
    #[serde(default)]
    pub adapter: Option<String>,
}

/// Main server configuration, loaded from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL URL for the primary store; absent means the in-memory
    /// store (single-process deployments and tests).
    pub database_url: Option<String>,
    /// Redis URL for the recent-events cache; absent means in-memory.
    pub redis_url: Option<String>,
    /// Events per flush batch.
    pub batch_size: usize,
    /// Maximum age of a partial batch before it is flushed.
    pub batch_interval_secs: u64,
    /// Ingest queue capacity.
    pub queue_capacity: usize,
    /// Flush attempts before the overflow log engages.
    pub max_flush_retries: u32,
    /// Overflow log path.
    pub overflow_path: PathBuf,
    /// Cold archive directory.
    pub archive_dir: PathBuf,
    /// Tenant assigned to events without one.
    pub default_tenant: String,
    /// Seconds between retention lifecycle passes.
    pub retention_interval_secs: u64,
    /// Webhook sources keyed by the `{source}` path segment.
    #[serde(default)]
    pub webhook_sources: HashMap<String, WebhookSourceConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: None,
            redis_url: None,
            batch_size: 100,
            batch_interval_secs: 5,
            queue_capacity: 10_000,
            max_flush_retries: 3,
            overflow_path: PathBuf::from("chronicle-overflow.jsonl"),
            archive_dir: PathBuf::from("chronicle-archive"),
            default_tenant: "default".to_string(),
            retention_interval_secs: 3_600,
            webhook_sources: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `CHRONICLE_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CHRONICLE_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("CHRONICLE_PORT") {
            config.port = port.parse()?;
        }
        config.database_url = std::env::var("CHRONICLE_DATABASE_URL").ok();
        config.redis_url = std::env::var("CHRONICLE_REDIS_URL").ok();
        if let Ok(size) = std::env::var("CHRONICLE_BATCH_SIZE") {
            config.batch_size = size.parse()?;
        }
        if let Ok(interval) = std::env::var("CHRONICLE_BATCH_INTERVAL_SECS") {
            config.batch_interval_secs = interval.parse()?;
        }
        if let Ok(capacity) = std::env::var("CHRONICLE_QUEUE_CAPACITY") {
            config.queue_capacity = capacity.parse()?;
        }
        if let Ok(retries) = std::env::var("CHRONICLE_MAX_FLUSH_RETRIES") {
            config.max_flush_retries = retries.parse()?;
        }
        if let Ok(path) = std::env::var("CHRONICLE_OVERFLOW_PATH") {
            config.overflow_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("CHRONICLE_ARCHIVE_DIR") {
            config.archive_dir = PathBuf::from(dir);
        }
        if let Ok(tenant) = std::env::var("CHRONICLE_DEFAULT_TENANT") {
            config.default_tenant = tenant;
        }
        if let Ok(interval) = std::env::var("CHRONICLE_RETENTION_INTERVAL_SECS") {
            config.retention_interval_secs = interval.parse()?;
        }
        // JSON map: {"orchestrator": {"token": "...", "secret": "..."}}
        if let Ok(sources) = std::env::var("CHRONICLE_WEBHOOK_SOURCES") {
            config.webhook_sources = serde_json::from_str(&sources)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be > 0");
        }
        if self.batch_interval_secs == 0 {
            anyhow::bail!("batch_interval_secs must be > 0");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be > 0");
        }
        for (source, webhook) in &self.webhook_sources {
            if webhook.token.is_empty() {
                anyhow::bail!("webhook source {source:?} has an empty token");
            }
        }
        Ok(())
    }

    /// The server's socket address.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Batch interval as a [`Duration`].
    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    /// Retention pass interval as a [`Duration`].
    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }
}
