//! SQLite-based record sink
//!
//! This module provides a sink that writes each aggregated record, with its
//! PDF documents, to the SQLite storage backend under one run.

use crate::output::traits::{RecordSink, SinkError, SinkResult};
use crate::record::{AggregatedRecord, ExtractionMethod};
use crate::storage::{RunCounts, RunStatus, SqliteStorage, Storage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQLite-based record sink
pub struct SqliteSink {
    storage: Arc<Mutex<SqliteStorage>>,
    run_id: i64,
}

impl SqliteSink {
    /// Starts a new run in `storage` and returns a sink bound to it
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `config_hash` - Hash of the configuration the run uses
    /// * `target` - The base URL being harvested
    pub fn start_run(
        storage: Arc<Mutex<SqliteStorage>>,
        config_hash: &str,
        target: &str,
    ) -> SinkResult<Self> {
        let run_id = lock(&storage)?.create_run(config_hash, target)?;
        tracing::info!("Recording to SQLite run {}", run_id);
        Ok(Self { storage, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Counts what this run has stored so far
    ///
    /// Used when a run fails before reporting totals; skipped pages are not
    /// stored, so `pages_skipped` stays zero.
    pub fn stored_counts(&self) -> SinkResult<RunCounts> {
        let storage = lock(&self.storage)?;
        let by_method = storage.count_pdfs_by_method(self.run_id)?;

        Ok(RunCounts {
            pages_scraped: storage.count_pages(self.run_id)?,
            pages_skipped: 0,
            pdfs_processed: by_method.values().sum(),
            pdfs_failed: by_method.get(&ExtractionMethod::Failed).copied().unwrap_or(0),
        })
    }

    /// Marks the run finished with its final counters
    pub fn finish_run(&self, status: RunStatus, counts: &RunCounts) -> SinkResult<()> {
        lock(&self.storage)?.finish_run(self.run_id, status, counts)?;
        Ok(())
    }
}

fn lock(storage: &Mutex<SqliteStorage>) -> SinkResult<MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|e| SinkError::Write(format!("Failed to lock storage: {}", e)))
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn push(&self, record: &AggregatedRecord) -> SinkResult<()> {
        let page_id = lock(&self.storage)?.insert_record(self.run_id, record)?;
        tracing::debug!("Stored {} as page {}", record.page.url, page_id);
        Ok(())
    }
}
