//! Statistics generation from the dataset database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::record::ExtractionMethod;
use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::HashMap;

/// Run statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// The run being described
    pub run: RunRecord,

    /// Number of stored page records
    pub pages_stored: u64,

    /// Count of PDF documents by extraction method
    pub pdfs_by_method: HashMap<ExtractionMethod, u64>,

    /// Sum of combined text lengths over all pages
    pub total_text_length: u64,

    /// Pages with the most combined text, longest first
    pub largest_pages: Vec<(String, u64)>,
}

impl CrawlStatistics {
    pub fn total_pdfs(&self) -> u64 {
        self.pdfs_by_method.values().sum()
    }

    /// Percentage of attempted PDFs that produced text
    pub fn pdf_success_rate(&self) -> f64 {
        let total = self.total_pdfs();
        if total == 0 {
            return 0.0;
        }
        let failed = self
            .pdfs_by_method
            .get(&ExtractionMethod::Failed)
            .copied()
            .unwrap_or(0);
        ((total - failed) as f64 / total as f64) * 100.0
    }
}

/// Loads statistics for the most recent run, or `None` if there is none
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<Option<CrawlStatistics>> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    let pages_stored = storage.count_pages(run.id)?;
    let pdfs_by_method = storage.count_pdfs_by_method(run.id)?;
    let total_text_length = storage.total_text_length(run.id)?;

    let mut largest_pages: Vec<(String, u64)> = storage
        .get_pages(run.id)?
        .into_iter()
        .map(|page| (page.url, page.total_text_length))
        .collect();
    largest_pages.sort_by(|a, b| b.1.cmp(&a.1));
    largest_pages.truncate(5);

    Ok(Some(CrawlStatistics {
        run,
        pages_stored,
        pdfs_by_method,
        total_text_length,
        largest_pages,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    let run = &stats.run;
    println!("=== Harvest Statistics ===\n");

    println!("Run {} ({})", run.id, run.status.to_db_string());
    println!("  Target: {}", run.target);
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!();

    println!("Pages:");
    println!("  Stored: {}", stats.pages_stored);
    println!("  Scraped: {}", run.counts.pages_scraped);
    println!("  Skipped: {}", run.counts.pages_skipped);
    println!("  Total text: {} chars", stats.total_text_length);
    println!();

    println!("PDF Documents:");
    let mut method_counts: Vec<_> = stats.pdfs_by_method.iter().collect();
    method_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (method, count) in method_counts {
        println!("  {}: {}", method, count);
    }
    println!(
        "  Success Rate: {:.1}% ({} attempted)",
        stats.pdf_success_rate(),
        stats.total_pdfs()
    );
    println!();

    if !stats.largest_pages.is_empty() {
        println!("Largest Pages:");
        for (url, length) in &stats.largest_pages {
            println!("  {} ({} chars)", url, length);
        }
    }
}
