//! Record types produced by a crawl
//!
//! - `PageRecord`: the structured content of one fetched page
//! - `PdfDocument`: the accounting entry for one attempted PDF
//! - `AggregatedRecord`: a page plus its PDFs, the unit handed to a sink
//!
//! All records are immutable once built and serialize to the stable,
//! snake_case field shape of the dataset.

use crate::text::char_len;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between web text and the joined PDF texts
pub const PDF_SECTION_SEPARATOR: &str = "\n\n--- PDF CONTENT ---\n\n";

/// Which extraction backend produced a PDF's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Text produced by the `pdf-extract` backend
    PdfExtract,
    /// Text produced by the `lopdf` backend
    Lopdf,
    /// No backend produced text, or the document was never downloaded
    Failed,
}

impl ExtractionMethod {
    /// Converts the method to its dataset string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfExtract => "pdf_extract",
            Self::Lopdf => "lopdf",
            Self::Failed => "failed",
        }
    }

    /// Parses a method from its dataset string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pdf_extract" => Some(Self::PdfExtract),
            "lopdf" => Some(Self::Lopdf),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Maps a backend name from the configuration to its method
    ///
    /// `failed` is not a backend and yields `None`.
    pub fn from_backend_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pdf-extract" | "pdf_extract" => Some(Self::PdfExtract),
            "lopdf" => Some(Self::Lopdf),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured content of one successfully fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub description: String,

    /// Normalized, length-capped body text
    pub web_content: String,
    pub web_content_length: usize,

    /// Internal links, capped for record size
    pub internal_links: Vec<String>,
    /// External links, capped for record size
    pub external_links: Vec<String>,
    /// Every PDF link found on the page
    pub pdf_links: Vec<String>,
    /// Internal plus external links found, before caps
    pub total_links: usize,

    pub scraped_at: DateTime<Utc>,
    pub status_code: u16,
    pub page_size_bytes: usize,
}

/// Accounting entry for one attempted PDF
///
/// Created even on failure, with empty text, so every attempted PDF shows up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfDocument {
    pub pdf_url: String,
    pub pdf_text: String,
    pub pdf_text_length: usize,
    pub extraction_method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
}

impl PdfDocument {
    /// Builds a document for text produced by `method`
    pub fn extracted(pdf_url: impl Into<String>, text: String, method: ExtractionMethod) -> Self {
        Self {
            pdf_url: pdf_url.into(),
            pdf_text_length: char_len(&text),
            pdf_text: text,
            extraction_method: method,
            error: None,
            extracted_at: Some(Utc::now()),
        }
    }

    /// Builds a failed document: empty text, method `failed`, and the cause
    pub fn failed(pdf_url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            pdf_url: pdf_url.into(),
            pdf_text: String::new(),
            pdf_text_length: 0,
            extraction_method: ExtractionMethod::Failed,
            error: Some(error.into()),
            extracted_at: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.extraction_method == ExtractionMethod::Failed
    }
}

/// A page record plus its PDFs and the combined text; the unit pushed to a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    #[serde(flatten)]
    pub page: PageRecord,
    pub pdf_documents: Vec<PdfDocument>,
    pub pdf_count: usize,
    /// Web text, then the separator and the non-empty PDF texts
    pub all_text_content: String,
    pub total_text_length: usize,
}

impl AggregatedRecord {
    /// Merges a page with its extracted PDF documents
    pub fn assemble(page: PageRecord, pdf_documents: Vec<PdfDocument>) -> Self {
        let all_text_content = combine_text(&page.web_content, &pdf_documents);

        Self {
            pdf_count: pdf_documents.len(),
            total_text_length: char_len(&all_text_content),
            all_text_content,
            pdf_documents,
            page,
        }
    }
}

/// Joins web text with the non-empty PDF texts
fn combine_text(web_content: &str, pdf_documents: &[PdfDocument]) -> String {
    let pdf_texts: Vec<&str> = pdf_documents
        .iter()
        .map(|doc| doc.pdf_text.as_str())
        .filter(|text| !text.is_empty())
        .collect();

    if pdf_texts.is_empty() {
        return web_content.to_string();
    }

    format!(
        "{}{}{}",
        web_content,
        PDF_SECTION_SEPARATOR,
        pdf_texts.join("\n\n")
    )
}
