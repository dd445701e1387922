//! JSON Lines sink: one serialized record per line

use crate::output::traits::{RecordSink, SinkResult};
use crate::record::AggregatedRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

/// Appends records to a `.jsonl` file
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it and its parent directory if needed
    pub async fn create(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn push(&self, record: &AggregatedRecord) -> SinkResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}
