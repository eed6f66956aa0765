//! Downstream delivery of denormalized records.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::denormalize::OutputRecord;
use crate::error::PublishError;

/// Accepts one batch of records per poll cycle.
///
/// A batch is either delivered in full or reported as failed. Retrying is up
/// to the implementation.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn publish(&self, batch: &[OutputRecord]) -> Result<(), PublishError>;
}

/// Writes records as newline-delimited JSON, appended to a file or to stdout.
#[derive(Debug, Clone, Default)]
pub struct JsonLinesSink {
    path: Option<PathBuf>,
}

impl JsonLinesSink {
    /// `None` writes to stdout.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn stdout() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn publish(&self, batch: &[OutputRecord]) -> Result<(), PublishError> {
        let mut buf = Vec::new();
        for record in batch {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        match &self.path {
            Some(path) => {
                debug!(path = %path.display(), records = batch.len(), "Appending JSON lines");
                let mut file = tokio::fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)
                    .await?;
                file.write_all(&buf).await?;
                file.flush().await?;
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&buf).await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }
}
