//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Site-Harvest dataset database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    target TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_scraped INTEGER NOT NULL DEFAULT 0,
    pages_skipped INTEGER NOT NULL DEFAULT 0,
    pdfs_processed INTEGER NOT NULL DEFAULT 0,
    pdfs_failed INTEGER NOT NULL DEFAULT 0
);

-- One row per aggregated record
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    web_content TEXT NOT NULL,
    web_content_length INTEGER NOT NULL,
    all_text_content TEXT NOT NULL,
    total_text_length INTEGER NOT NULL,
    internal_links TEXT NOT NULL,
    external_links TEXT NOT NULL,
    pdf_links TEXT NOT NULL,
    total_links INTEGER NOT NULL,
    pdf_count INTEGER NOT NULL,
    status_code INTEGER NOT NULL,
    page_size_bytes INTEGER NOT NULL,
    scraped_at TEXT NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);

-- Every attempted PDF, including failures
CREATE TABLE IF NOT EXISTS pdf_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id),
    position INTEGER NOT NULL,
    pdf_url TEXT NOT NULL,
    pdf_text TEXT NOT NULL,
    pdf_text_length INTEGER NOT NULL,
    extraction_method TEXT NOT NULL,
    error TEXT,
    extracted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_pdf_documents_page ON pdf_documents(page_id);
CREATE INDEX IF NOT EXISTS idx_pdf_documents_method ON pdf_documents(extraction_method);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
