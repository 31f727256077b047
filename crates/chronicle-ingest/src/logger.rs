//! The audit logger service handle.

use crate::normalize::{NormalizeError, Normalizer};
use crate::router::StorageRouter;
use crate::scheduler::{IngestMessage, IngestWorker};
use crate::{BatchConfig, IngestError};
use chronicle_types::{AuditEvent, EventId};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct AuditLoggerConfig {
    /// Maximum events queued ahead of the worker before producers feel
    /// backpressure.
    pub queue_capacity: usize,
    /// Batch size / interval tuning.
    pub batch: BatchConfig,
    /// Flush attempts before a batch is diverted to the overflow log.
    pub max_flush_retries: u32,
    /// Delay between inline retries of a forced flush.
    pub retry_delay: Duration,
    /// Overflow log location.
    pub overflow_path: PathBuf,
    /// Tenant assigned to events that do not carry one.
    pub default_tenant: String,
}

impl Default for AuditLoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            batch: BatchConfig::default(),
            max_flush_retries: 3,
            retry_delay: Duration::from_millis(100),
            overflow_path: PathBuf::from("chronicle-overflow.jsonl"),
            default_tenant: "default".to_string(),
        }
    }
}

/// Handle for submitting audit events.
///
/// Explicitly constructed and passed by reference; there is no process-wide
/// logger. `start()` spawns the single background worker that owns the batch
/// buffer; `shutdown()` drains it. Cloning the handle is cheap and shares the
/// same worker.
#[derive(Clone)]
pub struct AuditLogger {
    sender: mpsc::Sender<IngestMessage>,
    normalizer: Arc<Normalizer>,
    pending_depth: Arc<AtomicUsize>,
}

impl AuditLogger {
    /// Start the logger and its worker task.
    pub fn start(config: AuditLoggerConfig, router: StorageRouter) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let pending_depth = Arc::new(AtomicUsize::new(0));
        let worker = IngestWorker::new(router, &config, Arc::clone(&pending_depth));
        let handle = tokio::spawn(worker.run(receiver));
        info!(
            batch_size = config.batch.batch_size,
            batch_interval_ms = config.batch.batch_interval.as_millis() as u64,
            "Audit logger started"
        );
        let logger = Self {
            sender,
            normalizer: Arc::new(Normalizer::new(config.default_tenant)),
            pending_depth,
        };
        (logger, handle)
    }

    /// Normalize and enqueue a raw event map. Returns as soon as the event
    /// is buffered; storage failures are handled internally and never reach
    /// this caller.
    pub async fn log(&self, raw: serde_json::Value) -> Result<EventId, IngestError> {
        let event = self.normalizer.normalize(raw)?;
        let id = event.id;
        self.log_event(event).await?;
        Ok(id)
    }

    /// Enqueue an already-canonical event.
    pub async fn log_event(&self, event: AuditEvent) -> Result<(), IngestError> {
        self.sender
            .send(IngestMessage::Event(event))
            .await
            .map_err(|_| IngestError::WorkerGone)
    }

    /// Normalize a whole delivery before enqueuing any of it.
    ///
    /// Used by the webhook path so a malformed event rejects the delivery
    /// without half of it already buffered.
    pub async fn log_batch(
        &self,
        raws: Vec<serde_json::Value>,
    ) -> Result<Vec<EventId>, IngestError> {
        let mut events = Vec::with_capacity(raws.len());
        for raw in raws {
            events.push(self.normalizer.normalize(raw)?);
        }
        let ids = events.iter().map(|e| e.id).collect();
        for event in events {
            self.log_event(event).await?;
        }
        Ok(ids)
    }

    /// Normalize, enqueue, and wait until the event is durably flushed.
    ///
    /// For compliance-critical writes that must not proceed before the
    /// record exists. Surfaces [`IngestError::RetriesExhausted`] only after
    /// the full retry budget failed.
    pub async fn log_sync(&self, raw: serde_json::Value) -> Result<EventId, IngestError> {
        let event = self.normalizer.normalize(raw)?;
        let id = event.id;
        self.log_event(event).await?;
        self.flush().await?;
        Ok(id)
    }

    /// Force an out-of-band flush and wait for it to complete.
    pub async fn flush(&self) -> Result<(), IngestError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(IngestMessage::Flush(ack))
            .await
            .map_err(|_| IngestError::WorkerGone)?;
        done.await.map_err(|_| IngestError::WorkerGone)?
    }

    /// Events buffered but not yet durable: channel backlog plus the
    /// worker's partial batch.
    pub fn buffer_depth(&self) -> usize {
        let queued = self.sender.max_capacity() - self.sender.capacity();
        queued + self.pending_depth.load(Ordering::Relaxed)
    }

    /// Whether the worker is still accepting events.
    pub fn is_healthy(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Final drain-and-flush, then stop the worker.
    ///
    /// After this returns no buffered event is lost; other clones of the
    /// handle will get [`IngestError::WorkerGone`].
    pub async fn shutdown(&self) -> Result<(), IngestError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(IngestMessage::Shutdown(ack))
            .await
            .map_err(|_| IngestError::WorkerGone)?;
        done.await.map_err(|_| IngestError::WorkerGone)?;
        info!("Audit logger stopped");
        Ok(())
    }
}
