//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::{AggregatedRecord, ExtractionMethod, PdfDocument};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunCounts, RunRecord, RunStatus, StoredPage};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, target, status,
     pages_scraped, pages_skipped, pdfs_processed, pdfs_failed";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        target: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
        counts: RunCounts {
            pages_scraped: row.get::<_, i64>(6)? as u64,
            pages_skipped: row.get::<_, i64>(7)? as u64,
            pdfs_processed: row.get::<_, i64>(8)? as u64,
            pdfs_failed: row.get::<_, i64>(9)? as u64,
        },
    })
}

fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339()
}

fn from_db_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, target: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, target, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, target, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, counts: &RunCounts) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_scraped = ?3, pages_skipped = ?4,
             pdfs_processed = ?5, pdfs_failed = ?6 WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                counts.pages_scraped as i64,
                counts.pages_skipped as i64,
                counts.pdfs_processed as i64,
                counts.pdfs_failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Records =====

    fn insert_record(&mut self, run_id: i64, record: &AggregatedRecord) -> StorageResult<i64> {
        let page = &record.page;
        let internal_links = serde_json::to_string(&page.internal_links)?;
        let external_links = serde_json::to_string(&page.external_links)?;
        let pdf_links = serde_json::to_string(&page.pdf_links)?;

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO pages (run_id, url, title, description, web_content, web_content_length,
             all_text_content, total_text_length, internal_links, external_links, pdf_links,
             total_links, pdf_count, status_code, page_size_bytes, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                run_id,
                page.url,
                page.title,
                page.description,
                page.web_content,
                page.web_content_length as i64,
                record.all_text_content,
                record.total_text_length as i64,
                internal_links,
                external_links,
                pdf_links,
                page.total_links as i64,
                record.pdf_count as i64,
                page.status_code,
                page.page_size_bytes as i64,
                to_db_time(&page.scraped_at),
            ],
        )?;
        let page_id = tx.last_insert_rowid();

        for (position, doc) in record.pdf_documents.iter().enumerate() {
            tx.execute(
                "INSERT INTO pdf_documents (page_id, position, pdf_url, pdf_text, pdf_text_length,
                 extraction_method, error, extracted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    page_id,
                    position as i64,
                    doc.pdf_url,
                    doc.pdf_text,
                    doc.pdf_text_length as i64,
                    doc.extraction_method.as_str(),
                    doc.error,
                    doc.extracted_at.as_ref().map(to_db_time),
                ],
            )?;
        }

        tx.commit()?;
        Ok(page_id)
    }

    fn get_pages(&self, run_id: i64) -> StorageResult<Vec<StoredPage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, title, status_code, web_content_length, total_text_length,
             pdf_count, scraped_at
             FROM pages WHERE run_id = ?1 ORDER BY id",
        )?;

        let pages = stmt
            .query_map(params![run_id], |row| {
                Ok(StoredPage {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    status_code: row.get(3)?,
                    web_content_length: row.get::<_, i64>(4)? as u64,
                    total_text_length: row.get::<_, i64>(5)? as u64,
                    pdf_count: row.get::<_, i64>(6)? as u64,
                    scraped_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn get_pdf_documents(&self, page_id: i64) -> StorageResult<Vec<PdfDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT pdf_url, pdf_text, pdf_text_length, extraction_method, error, extracted_at
             FROM pdf_documents WHERE page_id = ?1 ORDER BY position",
        )?;

        let docs = stmt
            .query_map(params![page_id], |row| {
                Ok(PdfDocument {
                    pdf_url: row.get(0)?,
                    pdf_text: row.get(1)?,
                    pdf_text_length: row.get::<_, i64>(2)? as usize,
                    extraction_method: ExtractionMethod::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(ExtractionMethod::Failed),
                    error: row.get(4)?,
                    extracted_at: from_db_time(row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(docs)
    }

    // ===== Statistics =====

    fn count_pages(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_pdfs_by_method(&self, run_id: i64) -> StorageResult<HashMap<ExtractionMethod, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.extraction_method, COUNT(*) FROM pdf_documents d
             JOIN pages p ON p.id = d.page_id
             WHERE p.run_id = ?1
             GROUP BY d.extraction_method",
        )?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (method, count) = row?;
            if let Some(method) = ExtractionMethod::from_db_string(&method) {
                counts.insert(method, count as u64);
            }
        }

        Ok(counts)
    }

    fn total_text_length(&self, run_id: i64) -> StorageResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(total_text_length), 0) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }
}
