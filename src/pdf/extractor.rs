//! Downloads linked PDFs and turns them into [`PdfDocument`] records
//!
//! Every attempted PDF yields exactly one document: either extracted text or
//! a failed entry carrying the cause. Failures never abort the page.

use super::backend::{backends_from_names, PdfBackend};
use crate::config::{HttpConfig, PdfConfig};
use crate::crawler::{fetch_limited, FetchError};
use crate::record::{ExtractionMethod, PdfDocument};
use crate::text::normalize_and_cap;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cause recorded when every backend ran but none produced text
pub const NO_TEXT_EXTRACTED: &str = "No text could be extracted";

/// Downloads and extracts the PDFs linked from a page
pub struct PdfExtractor {
    client: Client,
    backends: Arc<Vec<Arc<dyn PdfBackend>>>,
    max_per_page: usize,
    max_bytes: u64,
    max_pages: usize,
    char_limit: usize,
    delay: Duration,
    timeout: Duration,
}

impl PdfExtractor {
    pub fn new(client: Client, pdf: &PdfConfig, http: &HttpConfig) -> Self {
        Self::with_backends(client, backends_from_names(&pdf.backends), pdf, http)
    }

    pub fn with_backends(
        client: Client,
        backends: Vec<Arc<dyn PdfBackend>>,
        pdf: &PdfConfig,
        http: &HttpConfig,
    ) -> Self {
        Self {
            client,
            backends: Arc::new(backends),
            max_per_page: pdf.max_per_page,
            max_bytes: pdf.max_bytes,
            max_pages: pdf.max_pages,
            char_limit: pdf.char_limit,
            delay: pdf.delay_duration(),
            timeout: http.pdf_timeout(),
        }
    }

    /// Processes the first `max_per_page` links, in order
    ///
    /// Pauses between downloads but not after the last one. Stops early,
    /// returning what it has, if the run is cancelled.
    pub async fn extract_all(&self, pdf_links: &[String], cancel: &CancellationToken) -> Vec<PdfDocument> {
        let mut documents = Vec::new();

        for (index, url) in pdf_links.iter().take(self.max_per_page).enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = cancel.cancelled() => break,
                }
            }

            let document = tokio::select! {
                document = self.extract_one(url) => document,
                _ = cancel.cancelled() => break,
            };
            documents.push(document);
        }

        if pdf_links.len() > self.max_per_page {
            tracing::debug!(
                "Processed {} of {} PDF links",
                self.max_per_page,
                pdf_links.len()
            );
        }

        documents
    }

    /// Downloads one PDF and runs the backends over it
    pub async fn extract_one(&self, url: &str) -> PdfDocument {
        tracing::info!("Processing PDF: {}", url);

        let bytes = match fetch_limited(&self.client, url, self.timeout, self.max_bytes).await {
            Ok(result) => result.body,
            Err(FetchError::TooLarge { size, .. }) => {
                tracing::warn!("PDF too large ({} bytes), skipping: {}", size, url);
                return PdfDocument::failed(url, format!("PDF too large ({} bytes)", size));
            }
            Err(e) => {
                tracing::warn!("PDF download failed: {}", e);
                return PdfDocument::failed(url, e.to_string());
            }
        };

        let backends = Arc::clone(&self.backends);
        let (max_pages, char_limit) = (self.max_pages, self.char_limit);
        let outcome = tokio::task::spawn_blocking(move || {
            extract_text(&backends, &bytes, max_pages, char_limit)
        })
        .await;

        match outcome {
            Ok(Ok((text, method))) => {
                tracing::info!("Extracted {} chars from {} via {}", text.chars().count(), url, method);
                PdfDocument::extracted(url, text, method)
            }
            Ok(Err(reason)) => {
                tracing::warn!("PDF extraction failed for {}: {}", url, reason);
                PdfDocument::failed(url, reason)
            }
            Err(e) => PdfDocument::failed(url, format!("extraction task failed: {}", e)),
        }
    }
}

/// Runs backends in order over `bytes`; the first non-empty text wins
///
/// Page texts are joined with newlines, whitespace-normalized and capped at
/// `char_limit` characters. On failure returns the last backend error, or
/// [`NO_TEXT_EXTRACTED`] when backends ran cleanly but found nothing.
pub fn extract_text(
    backends: &[Arc<dyn PdfBackend>],
    bytes: &[u8],
    max_pages: usize,
    char_limit: usize,
) -> Result<(String, ExtractionMethod), String> {
    let mut last_error = None;

    for backend in backends {
        match backend.extract_pages(bytes, max_pages) {
            Ok(pages) => {
                let text = normalize_and_cap(&pages.join("\n"), char_limit);
                if !text.is_empty() {
                    return Ok((text, backend.method()));
                }
                tracing::debug!("{} produced no text", backend.method());
            }
            Err(e) => {
                tracing::debug!("{} failed: {}", backend.method(), e);
                last_error = Some(e.to_string());
            }
        }
    }

    Err(last_error.unwrap_or_else(|| NO_TEXT_EXTRACTED.to_string()))
}
