//! Cold archive segment export.

use crate::archive::{
    ArchiveIndex, ArchiveIndexEntry, ArchiveMetadata, CompressionKind,
};
use crate::ArchiveError;
use chrono::{DateTime, Utc};
use chronicle_types::AuditEvent;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const TOMBSTONE_FILE: &str = "erasures.json";
const FORMAT_VERSION: u32 = 1;

/// Compressed JSONL archive for cold-tier events.
///
/// Each exported segment is one JSONL file plus a sidecar index and metadata
/// document. Segments are immutable; erasure is handled by the tombstone
/// list consulted at read time, and expiry by purging whole segments.
pub struct ColdArchive {
    root: PathBuf,
    compression: CompressionKind,
}

impl ColdArchive {
    /// Create an archive rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, compression: CompressionKind) -> Self {
        Self {
            root: root.into(),
            compression,
        }
    }

    /// Archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a segment file.
    pub fn segment_path(&self, metadata: &ArchiveMetadata) -> PathBuf {
        self.root.join(&metadata.file_name)
    }

    fn index_path(&self, file_name: &str) -> PathBuf {
        self.root.join(format!("{file_name}.index.json"))
    }

    fn metadata_path(&self, file_name: &str) -> PathBuf {
        self.root.join(format!("{file_name}.meta.json"))
    }

    /// Export events into a new segment.
    ///
    /// `purge_after` is the instant the whole segment may be deleted: the
    /// latest expiry of any contained event, computed by the caller from the
    /// policy table.
    pub fn export_segment(
        &self,
        events: &[AuditEvent],
        purge_after: DateTime<Utc>,
    ) -> Result<ArchiveMetadata, ArchiveError> {
        fs::create_dir_all(&self.root)?;

        let segment_id = uuid::Uuid::new_v4().to_string();
        let period_start = events
            .iter()
            .map(|e| e.timestamp)
            .min()
            .unwrap_or_else(Utc::now);
        let period_end = events
            .iter()
            .map(|e| e.timestamp)
            .max()
            .unwrap_or_else(Utc::now);
        let file_name = format!(
            "audit_{}_{}_{}.jsonl{}",
            period_start.format("%Y%m%d"),
            period_end.format("%Y%m%d"),
            &segment_id[..8],
            self.compression.extension()
        );

        let file = File::create(self.root.join(&file_name))?;
        let mut writer: Box<dyn Write> = match self.compression {
            CompressionKind::None => Box::new(BufWriter::new(file)),
            CompressionKind::Gzip => Box::new(GzEncoder::new(
                BufWriter::new(file),
                Compression::default(),
            )),
            CompressionKind::Zstd => {
                Box::new(zstd::Encoder::new(BufWriter::new(file), 3)?.auto_finish())
            }
        };

        let mut hasher = Sha256::new();
        let mut original_size = 0u64;
        let mut offset = 0u64;
        let mut entries = Vec::with_capacity(events.len());

        for event in events {
            let mut line = serde_json::to_string(event)?;
            line.push('\n');
            let bytes = line.as_bytes();

            writer.write_all(bytes)?;
            hasher.update(bytes);

            entries.push(ArchiveIndexEntry {
                event_id: event.id,
                timestamp: event.timestamp,
                event_type: event.event_type.as_str().to_string(),
                actor_id: event.actor.id.clone(),
                offset,
                length: bytes.len() as u32,
            });
            offset += bytes.len() as u64;
            original_size += bytes.len() as u64;
        }

        writer.flush()?;
        drop(writer);

        let compressed_size = fs::metadata(self.root.join(&file_name))?.len();
        let checksum = format!("{:x}", hasher.finalize());

        let index = ArchiveIndex {
            segment_id: segment_id.clone(),
            entries,
            created_at: Utc::now(),
        };
        let index_file = File::create(self.index_path(&file_name))?;
        serde_json::to_writer(BufWriter::new(index_file), &index)?;

        let metadata = ArchiveMetadata {
            id: segment_id,
            file_name: file_name.clone(),
            created_at: Utc::now(),
            period_start,
            period_end,
            purge_after,
            event_count: events.len() as u64,
            original_size,
            compressed_size,
            compression: self.compression,
            checksum,
            format_version: FORMAT_VERSION,
        };
        let metadata_file = File::create(self.metadata_path(&file_name))?;
        serde_json::to_writer_pretty(BufWriter::new(metadata_file), &metadata)?;

        info!(
            segment = %metadata.file_name,
            events = metadata.event_count,
            "Exported cold archive segment"
        );
        Ok(metadata)
    }

    /// Load the sidecar index of a segment.
    pub fn load_index(&self, metadata: &ArchiveMetadata) -> Result<ArchiveIndex, ArchiveError> {
        let file = File::open(self.index_path(&metadata.file_name))?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// List every segment's metadata, oldest period first.
    pub fn list_segments(&self) -> Result<Vec<ArchiveMetadata>, ArchiveError> {
        let mut segments = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(segments),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".meta.json"))
            {
                let file = File::open(&path)?;
                segments.push(serde_json::from_reader(std::io::BufReader::new(file))?);
            }
        }
        segments.sort_by_key(|m: &ArchiveMetadata| m.period_start);
        Ok(segments)
    }

    /// Record an erasure tombstone for an actor.
    pub fn add_tombstone(&self, actor_id: &str) -> Result<(), ArchiveError> {
        fs::create_dir_all(&self.root)?;
        let mut tombstones = self.tombstones()?;
        if tombstones.insert(actor_id.to_string()) {
            let file = File::create(self.root.join(TOMBSTONE_FILE))?;
            serde_json::to_writer(BufWriter::new(file), &tombstones)?;
        }
        Ok(())
    }

    /// The current tombstone set.
    pub fn tombstones(&self) -> Result<BTreeSet<String>, ArchiveError> {
        match File::open(self.root.join(TOMBSTONE_FILE)) {
            Ok(file) => Ok(serde_json::from_reader(std::io::BufReader::new(file))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete segments whose `purge_after` has passed. Returns the number of
    /// purged segments.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ArchiveError> {
        let mut purged = 0;
        for metadata in self.list_segments()? {
            if metadata.purge_after <= now {
                fs::remove_file(self.segment_path(&metadata))?;
                let _ = fs::remove_file(self.index_path(&metadata.file_name));
                fs::remove_file(self.metadata_path(&metadata.file_name))?;
                info!(segment = %metadata.file_name, "Purged expired archive segment");
                purged += 1;
            }
        }
        Ok(purged)
    }
}
