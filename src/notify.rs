//! Report notifications
//!
//! Delivery is pluggable. A failed notification is logged by the caller and
//! never changes the outcome of the run it describes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::models::{CompletionReport, DiscoveryReport};

/// Errors that can occur while sending a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to serialize notification: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write notification to '{path}': {reason}")]
    Write { path: String, reason: String },
}

/// Payload of a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum NotificationMessage {
    Discovery(DiscoveryReport),
    Completion(CompletionReport),
}

impl NotificationMessage {
    /// One-line description for logs
    pub fn subject(&self) -> String {
        match self {
            NotificationMessage::Discovery(report) => {
                format!("Discovery run {}: {}", report.run_id, report.summary())
            }
            NotificationMessage::Completion(report) => format!(
                "Crawl job {} {}: {} column(s), {} duplicate(s) removed",
                report.job_id,
                match report.status {
                    crate::models::JobRunStatus::Succeeded => "succeeded",
                    crate::models::JobRunStatus::Failed => "failed",
                },
                report.final_columns.len(),
                report.duplicates_removed.len()
            ),
        }
    }
}

/// Sends reports somewhere
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        match message {
            NotificationMessage::Discovery(report) if !report.is_clean() => {
                tracing::warn!("{}", message.subject());
            }
            _ => tracing::info!("{}", message.subject()),
        }
        Ok(())
    }
}

/// Appends notifications to a file, one JSON document per line
#[derive(Debug, Clone)]
pub struct JsonFileNotifier {
    path: PathBuf,
}

impl JsonFileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Notifier for JsonFileNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let write_error = |e: std::io::Error| NotifyError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_error)?;
        file.write_all(line.as_bytes()).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use tempfile::tempdir;

    #[test]
    fn test_message_is_tagged() {
        let message = NotificationMessage::Discovery(DiscoveryReport::new(SourceKind::Scan));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "discovery");
        assert_eq!(json["payload"]["source"], "scan");
    }

    #[tokio::test]
    async fn test_json_file_notifier_appends_lines() {
        let dir = tempdir().unwrap();
        let notifier = JsonFileNotifier::new(dir.path().join("reports.jsonl"));

        for _ in 0..2 {
            let message = NotificationMessage::Discovery(DiscoveryReport::new(SourceKind::Manifest));
            notifier.notify(&message).await.unwrap();
        }

        let content = std::fs::read_to_string(notifier.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: NotificationMessage = serde_json::from_str(lines[1]).unwrap();
        assert!(matches!(parsed, NotificationMessage::Discovery(_)));
    }
}
