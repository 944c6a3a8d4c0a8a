//! JSONL mirror of the audit chain for offline verification.

use crate::event::AuditEvent;
use crate::verify::{verify_chain, ChainVerification};
use crate::AuditResult;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Append-only JSONL sink, one event per line.
///
/// The in-memory [`AuditLog`](crate::AuditLog) is authoritative; the sink
/// exists so the chain can be replayed and verified offline, outside the
/// engine process.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one finalized event.
    pub async fn write(&self, event: &AuditEvent) -> AuditResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    /// Read all events back in file order.
    pub async fn read_all(&self) -> AuditResult<Vec<AuditEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(&line)?;
            events.push(event);
        }

        Ok(events)
    }

    /// Offline verification entry point: replay the file through the chain
    /// verifier.
    pub async fn verify(&self) -> AuditResult<ChainVerification> {
        let events = self.read_all().await?;
        Ok(verify_chain(&events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditActor, AuditKind, DraftEvent};
    use crate::log::AuditLog;
    use seva_types::Arn;

    fn draft(step: u32) -> DraftEvent {
        DraftEvent::new(
            Arn::new("ARN-1"),
            AuditKind::TransitionExecuted,
            AuditActor::system("test"),
            serde_json::json!({"step": step}),
        )
    }

    #[tokio::test]
    async fn mirror_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("audit.jsonl"));
        let log = AuditLog::new();

        for step in 0..4 {
            let event = log.append(draft(step));
            sink.write(&event).await.unwrap();
        }

        let replayed = sink.read_all().await.unwrap();
        assert_eq!(replayed.len(), 4);

        let verification = sink.verify().await.unwrap();
        assert!(verification.ok);
        assert_eq!(verification.checked_count, 4);
    }

    #[tokio::test]
    async fn tampered_file_fails_offline_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlSink::new(path.clone());
        let log = AuditLog::new();

        for step in 0..3 {
            sink.write(&log.append(draft(step))).await.unwrap();
        }

        // Flip a payload byte in the middle line.
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let tampered = contents.replacen("\"step\":1", "\"step\":9", 1);
        tokio::fs::write(&path, tampered).await.unwrap();

        let verification = sink.verify().await.unwrap();
        assert!(!verification.ok);
        assert_eq!(verification.checked_count, 1);
        assert_eq!(verification.mismatch.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_chain() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("absent.jsonl"));
        let verification = sink.verify().await.unwrap();
        assert!(verification.ok);
        assert_eq!(verification.checked_count, 0);
    }
}
