//! Cold archive metadata and index types.

use chrono::{DateTime, Utc};
use chronicle_types::EventId;
use serde::{Deserialize, Serialize};

/// Compression algorithm for archive segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    None,
    Gzip,
    Zstd,
}

impl CompressionKind {
    /// File extension suffix.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Zstd => ".zst",
        }
    }
}

/// Metadata for one archive segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Segment identifier.
    pub id: String,
    /// Segment file name within the archive root.
    pub file_name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Earliest event timestamp in the segment.
    pub period_start: DateTime<Utc>,
    /// Latest event timestamp in the segment.
    pub period_end: DateTime<Utc>,
    /// When the whole segment may be physically purged. Computed as the
    /// latest expiry instant of any contained event.
    pub purge_after: DateTime<Utc>,
    /// Number of events.
    pub event_count: u64,
    /// Uncompressed size in bytes.
    pub original_size: u64,
    /// On-disk size in bytes.
    pub compressed_size: u64,
    /// Compression algorithm used.
    pub compression: CompressionKind,
    /// SHA-256 over the uncompressed JSONL content.
    pub checksum: String,
    /// Segment format version.
    pub format_version: u32,
}

/// Archive index entry, one per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveIndexEntry {
    /// Event id.
    pub event_id: EventId,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Dotted event type.
    pub event_type: String,
    /// Actor id, consulted when applying erasure tombstones.
    pub actor_id: String,
    /// Byte offset into the uncompressed segment.
    pub offset: u64,
    /// Line length in bytes.
    pub length: u32,
}

/// Sidecar index for one segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveIndex {
    /// Segment this index belongs to.
    pub segment_id: String,
    /// Index entries in segment order.
    pub entries: Vec<ArchiveIndexEntry>,
    /// Index creation time.
    pub created_at: DateTime<Utc>,
}

impl ArchiveIndex {
    /// Entries within a time range.
    pub fn search_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&ArchiveIndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect()
    }

    /// Entries for one actor.
    pub fn search_by_actor(&self, actor_id: &str) -> Vec<&ArchiveIndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.actor_id == actor_id)
            .collect()
    }
}
