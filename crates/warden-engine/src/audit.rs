//! Audit sink contract and in-process sinks.
//!
//! The executor writes lifecycle events and never reads them back.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::AuditError;
use crate::types::{AuditEvent, AuditStatus};

/// Append-only destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Keeps every event in memory for later inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn statuses(&self) -> Vec<AuditStatus> {
        self.events().iter().map(|e| e.status).collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Mirrors audit events into the tracing log under the `warden::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let details = serde_json::Value::Object(event.details.clone());
        tracing::info!(
            target: "warden::audit",
            request_id = %event.request_id,
            action_type = %event.action_type,
            actor = event.actor.as_deref().unwrap_or("-"),
            status = %event.status,
            timestamp = %event.timestamp,
            details = %details,
            "Audit event"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlAuditSink {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonlAuditSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::info!(path = %path.display(), "Audit log opened");
        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Records each event to several sinks in order, stopping at the first error.
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.record(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use uuid::Uuid;
    use warden_core::types::Timestamp;

    fn event(status: AuditStatus) -> AuditEvent {
        let mut details = Map::new();
        details.insert("dry_run".to_string(), json!(false));
        AuditEvent {
            request_id: Uuid::new_v4(),
            timestamp: Timestamp(1_700_000_000_000),
            action_type: "project.system.write_text_file".to_string(),
            actor: Some("alice".to_string()),
            status,
            details,
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Sink("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_memory_sink_records_in_order() {
        let sink = MemoryAuditSink::new();
        sink.record(&event(AuditStatus::Started)).await.unwrap();
        sink.record(&event(AuditStatus::Completed)).await.unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink.statuses(),
            vec![AuditStatus::Started, AuditStatus::Completed]
        );
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        assert!(TracingAuditSink.record(&event(AuditStatus::Blocked)).await.is_ok());
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");

        let sink = JsonlAuditSink::open(&path).await.unwrap();
        sink.record(&event(AuditStatus::Started)).await.unwrap();
        sink.record(&event(AuditStatus::Failed)).await.unwrap();
        drop(sink);

        // Reopening appends rather than truncating.
        let sink = JsonlAuditSink::open(&path).await.unwrap();
        assert_eq!(sink.path(), path.as_path());
        sink.record(&event(AuditStatus::Completed)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<AuditEvent> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].status, AuditStatus::Started);
        assert_eq!(lines[1].status, AuditStatus::Failed);
        assert_eq!(lines[2].status, AuditStatus::Completed);
        assert_eq!(lines[0].details["dry_run"], json!(false));
    }

    #[tokio::test]
    async fn test_fanout_records_to_every_sink() {
        let a = Arc::new(MemoryAuditSink::new());
        let b = Arc::new(MemoryAuditSink::new());
        let fanout = FanoutAuditSink::new()
            .with_sink(a.clone())
            .with_sink(b.clone());
        assert_eq!(fanout.len(), 2);

        fanout.record(&event(AuditStatus::Started)).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[tokio::test]
    async fn test_fanout_stops_at_first_error() {
        let after = Arc::new(MemoryAuditSink::new());
        let fanout = FanoutAuditSink::new()
            .with_sink(Arc::new(BrokenSink))
            .with_sink(after.clone());

        let err = fanout.record(&event(AuditStatus::Started)).await.unwrap_err();
        assert!(matches!(err, AuditError::Sink(_)));
        assert!(after.is_empty());
    }
}
