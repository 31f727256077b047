//! Retention lifecycle management for Chronicle.
//!
//! A periodic background job walks the stored events and applies the
//! per-category policy table: hot records age into warm, warm records are
//! exported to compressed cold archives, and expired records are physically
//! deleted. Erasure requests short-circuit the state machine and remove an
//! actor's events from every backend and tier.
//!
//! The job is idempotent and restartable: candidates are selected by age and
//! current tier, and every transition stamps a per-record watermark, so an
//! interrupted pass can be resumed without double-processing.

mod archive;
mod erasure;
mod export;
mod lifecycle;
mod policy;
mod restore;

pub use archive::{ArchiveIndex, ArchiveIndexEntry, ArchiveMetadata, CompressionKind};
pub use erasure::{ErasureCoordinator, ErasureReport};
pub use export::ColdArchive;
pub use lifecycle::{LifecycleConfig, LifecycleManager, LifecycleReport};
pub use policy::{PolicyTable, TierDecision, TierWindows};
pub use restore::{read_segment, restore_segment, verify_segment};

use chronicle_backends::{CacheError, SearchError, StoreError};

/// Retention subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    /// Erasure racing a legal hold; retry once the hold clears.
    #[error("erasure conflicts with an active legal hold on {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    /// A backend reported success but verification still found records.
    #[error("erasure incomplete: {0}")]
    Incomplete(String),
    #[error("invalid retention policy: {0}")]
    InvalidPolicy(String),
}

/// Cold archive errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("checksum mismatch for {0}")]
    ChecksumMismatch(String),
    #[error("task error: {0}")]
    Join(String),
}
