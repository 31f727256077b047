//! On-disk overflow log for events that exhausted their write retries.

use chronicle_types::AuditEvent;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::error;

/// Append-only JSONL fallback store.
///
/// Events land here only after the primary-store retry budget is exhausted;
/// an operator replays the file once the backend recovers. Appending raises
/// an operational alert: this path engaging at all means data is at risk.
pub struct OverflowLog {
    path: PathBuf,
}

impl OverflowLog {
    /// Create a log writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch, one JSON document per line.
    pub async fn append_batch(&self, events: &[AuditEvent]) -> io::Result<u64> {
        let mut lines = String::new();
        for event in events {
            let json = serde_json::to_string(event)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            lines.push_str(&json);
            lines.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;

        error!(
            target: "chronicle::alerts",
            count = events.len(),
            path = %self.path.display(),
            "Write retries exhausted; events diverted to overflow log"
        );
        Ok(events.len() as u64)
    }

    /// Read every event back, skipping unparseable lines.
    pub async fn read_all(&self) -> io::Result<Vec<AuditEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_types::{Actor, EventType};

    fn event() -> AuditEvent {
        AuditEvent::builder(
            EventType::parse("system.test.tick").unwrap(),
            Actor::system("tests"),
        )
        .build()
    }

    #[tokio::test]
    async fn test_append_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = OverflowLog::new(dir.path().join("overflow.jsonl"));

        let events = vec![event(), event()];
        assert_eq!(log.append_batch(&events).await.unwrap(), 2);
        assert_eq!(log.append_batch(&events[..1]).await.unwrap(), 1);

        let back = log.read_all().await.unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[0].id, events[0].id);
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = OverflowLog::new(dir.path().join("absent.jsonl"));
        assert!(log.read_all().await.unwrap().is_empty());
    }
}
