//! Event ingestion pipeline for Chronicle.
//!
//! The write path: a raw event map is validated and enriched by the
//! [`Normalizer`], buffered by the ingest worker's [`BatchCollector`], and
//! flushed (on a size threshold or a time interval, whichever trips first)
//! through the [`StorageRouter`] to the configured backends. Failed batches
//! are re-fronted and retried; exhausted batches land in the on-disk
//! [`OverflowLog`] rather than being dropped.
//!
//! Callers hold an [`AuditLogger`], an explicitly constructed handle with a
//! `start()`/`shutdown()` lifecycle. `log` is fire-and-forget; `log_sync`
//! waits for durability.

mod batch;
mod logger;
mod normalize;
mod overflow;
mod router;
mod scheduler;

pub use batch::{BatchCollector, BatchConfig, EventBatch};
pub use logger::{AuditLogger, AuditLoggerConfig};
pub use normalize::{Normalizer, NormalizeError};
pub use overflow::OverflowLog;
pub use router::{BackendHealth, RouteOutcome, RouterConfig, StorageRouter};
pub use scheduler::IngestMessage;

/// Errors surfaced by the ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The input could not be normalized. Caller's fault, returned
    /// synchronously.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    /// A forced flush failed before the retry budget ran out.
    #[error("flush failed: {0}")]
    FlushFailed(String),
    /// The retry budget is exhausted; the batch went to the overflow log.
    #[error("write retries exhausted, events diverted to overflow log")]
    RetriesExhausted,
    /// The ingest worker has stopped.
    #[error("ingest worker is gone")]
    WorkerGone,
}
