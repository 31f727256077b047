//! Cold archive retrieval.

use crate::archive::{ArchiveMetadata, CompressionKind};
use crate::export::ColdArchive;
use crate::ArchiveError;
use chronicle_types::AuditEvent;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

fn open_reader(
    archive: &ColdArchive,
    metadata: &ArchiveMetadata,
) -> Result<Box<dyn Read>, ArchiveError> {
    let file = File::open(archive.segment_path(metadata))?;
    Ok(match metadata.compression {
        CompressionKind::None => Box::new(file),
        CompressionKind::Gzip => Box::new(GzDecoder::new(file)),
        CompressionKind::Zstd => Box::new(zstd::Decoder::new(file)?),
    })
}

/// Read every event of a segment, without tombstone filtering.
pub fn read_segment(
    archive: &ColdArchive,
    metadata: &ArchiveMetadata,
) -> Result<Vec<AuditEvent>, ArchiveError> {
    let reader = BufReader::new(open_reader(archive, metadata)?);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}

/// The explicit restore step for cold data: verify the segment checksum,
/// then return its events with erasure tombstones applied.
pub fn restore_segment(
    archive: &ColdArchive,
    metadata: &ArchiveMetadata,
) -> Result<Vec<AuditEvent>, ArchiveError> {
    if !verify_segment(archive, metadata)? {
        return Err(ArchiveError::ChecksumMismatch(metadata.file_name.clone()));
    }
    let tombstones = archive.tombstones()?;
    Ok(read_segment(archive, metadata)?
        .into_iter()
        .filter(|event| !tombstones.contains(&event.actor.id))
        .collect())
}

/// Recompute the checksum over the uncompressed content and compare.
pub fn verify_segment(
    archive: &ColdArchive,
    metadata: &ArchiveMetadata,
) -> Result<bool, ArchiveError> {
    let mut reader = open_reader(archive, metadata)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()) == metadata.checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chronicle_types::{Actor, EventType};

    fn event(actor: &str) -> AuditEvent {
        AuditEvent::builder(
            EventType::parse("data.record.created").unwrap(),
            Actor::user(actor),
        )
        .tenant("acme")
        .build()
    }

    fn roundtrip(compression: CompressionKind) {
        let dir = tempfile::tempdir().unwrap();
        let archive = ColdArchive::new(dir.path(), compression);

        let events = vec![event("u-1"), event("u-2"), event("u-1")];
        let metadata = archive.export_segment(&events, Utc::now()).unwrap();
        assert_eq!(metadata.event_count, 3);

        assert!(verify_segment(&archive, &metadata).unwrap());
        let back = read_segment(&archive, &metadata).unwrap();
        assert_eq!(back, events);

        let index = archive.load_index(&metadata).unwrap();
        assert_eq!(index.entries.len(), 3);
        assert_eq!(index.search_by_actor("u-1").len(), 2);
    }

    #[test]
    fn test_roundtrip_plain() {
        roundtrip(CompressionKind::None);
    }

    #[test]
    fn test_roundtrip_gzip() {
        roundtrip(CompressionKind::Gzip);
    }

    #[test]
    fn test_roundtrip_zstd() {
        roundtrip(CompressionKind::Zstd);
    }

    #[test]
    fn test_restore_applies_tombstones() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ColdArchive::new(dir.path(), CompressionKind::Gzip);

        let events = vec![event("u-1"), event("u-2")];
        let metadata = archive.export_segment(&events, Utc::now()).unwrap();

        archive.add_tombstone("u-1").unwrap();
        let restored = restore_segment(&archive, &metadata).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].actor.id, "u-2");
    }

    #[test]
    fn test_purge_expired_segments() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ColdArchive::new(dir.path(), CompressionKind::Gzip);

        let past = Utc::now() - chrono::Duration::days(1);
        let future = Utc::now() + chrono::Duration::days(1);
        archive.export_segment(&[event("u-1")], past).unwrap();
        let keep = archive.export_segment(&[event("u-2")], future).unwrap();

        assert_eq!(archive.purge_expired(Utc::now()).unwrap(), 1);
        let remaining = archive.list_segments().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[test]
    fn test_corrupted_segment_fails_restore() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ColdArchive::new(dir.path(), CompressionKind::None);

        let metadata = archive
            .export_segment(&[event("u-1")], Utc::now())
            .unwrap();
        std::fs::write(archive.segment_path(&metadata), b"{\"garbage\":true}\n").unwrap();

        assert!(matches!(
            restore_segment(&archive, &metadata),
            Err(ArchiveError::ChecksumMismatch(_))
        ));
    }
}
