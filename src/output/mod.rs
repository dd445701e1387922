//! Output module for handing harvested records to their destination
//!
//! This module handles:
//! - The [`RecordSink`] interface the coordinator pushes records into
//! - JSON Lines and SQLite sinks, plus an in-memory sink
//! - Fan-out to several sinks at once
//! - Statistics over a stored run

mod jsonl;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use sqlite_output::SqliteSink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{RecordSink, SinkError, SinkResult};

use crate::record::AggregatedRecord;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Keeps every record in memory; used by tests and dry runs
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<AggregatedRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records received so far
    pub fn records(&self) -> Vec<AggregatedRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn push(&self, record: &AggregatedRecord) -> SinkResult<()> {
        self.records
            .lock()
            .map_err(|e| SinkError::Write(format!("Failed to lock records: {}", e)))?
            .push(record.clone());
        Ok(())
    }
}

/// Forwards every record to each inner sink in order; the first error wins
pub struct FanoutSink {
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn RecordSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl RecordSink for FanoutSink {
    async fn push(&self, record: &AggregatedRecord) -> SinkResult<()> {
        for sink in &self.sinks {
            sink.push(record).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        for sink in &self.sinks {
            sink.flush().await?;
        }
        Ok(())
    }
}
