//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::record::{AggregatedRecord, ExtractionMethod, PdfDocument};
use crate::storage::{RunCounts, RunRecord, RunStatus, StoredPage};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the SQLite sink and
/// the statistics report.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `target` - The base URL being harvested
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, target: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status and counters of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus, counts: &RunCounts) -> StorageResult<()>;

    // ===== Records =====

    /// Stores an aggregated record and its PDF documents atomically
    ///
    /// # Returns
    ///
    /// The ID of the stored page row
    fn insert_record(&mut self, run_id: i64, record: &AggregatedRecord) -> StorageResult<i64>;

    /// Gets summary rows for every page of a run, in insertion order
    fn get_pages(&self, run_id: i64) -> StorageResult<Vec<StoredPage>>;

    /// Gets the PDF documents of a page, in processing order
    fn get_pdf_documents(&self, page_id: i64) -> StorageResult<Vec<PdfDocument>>;

    // ===== Statistics =====

    /// Counts stored pages of a run
    fn count_pages(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts a run's PDF documents per extraction method
    fn count_pdfs_by_method(&self, run_id: i64) -> StorageResult<HashMap<ExtractionMethod, u64>>;

    /// Sums `total_text_length` over a run's pages
    fn total_text_length(&self, run_id: i64) -> StorageResult<u64>;
}
