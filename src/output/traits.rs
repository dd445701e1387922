//! Record sink trait and error types
//!
//! A sink receives every aggregated record of a run, in completion order.
//! A record the sink rejects fails the whole run.

use crate::record::AggregatedRecord;
use crate::storage::StorageError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while handing a record to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write record: {0}")]
    Write(String),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for aggregated records
///
/// Implementations must be shareable between crawl workers.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Accepts one record
    ///
    /// # Arguments
    ///
    /// * `record` - The page with its PDFs and combined text
    async fn push(&self, record: &AggregatedRecord) -> SinkResult<()>;

    /// Flushes buffered output; called once after the last record
    async fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}
