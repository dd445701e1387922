//! PDF text extraction backends
//!
//! Each backend turns raw PDF bytes into per-page text. Backends are tried in
//! the configured order and the first one that yields text wins.

use crate::record::ExtractionMethod;
use lopdf::Document;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    Open(String),

    #[error("PDF is encrypted")]
    Encrypted,

    #[error("failed to extract text: {0}")]
    Extraction(String),

    #[error("extractor panicked on malformed PDF")]
    Panicked,
}

/// A PDF text extraction backend
///
/// Implementations are synchronous and CPU-bound; callers run them on the
/// blocking thread pool.
pub trait PdfBackend: Send + Sync {
    /// The method recorded on documents this backend extracted
    fn method(&self) -> ExtractionMethod;

    /// Extracts the text of at most `max_pages` pages, in page order
    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<String>, BackendError>;
}

/// Backend built on the `pdf-extract` crate
#[derive(Debug, Default)]
pub struct PdfExtractBackend;

impl PdfBackend for PdfExtractBackend {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PdfExtract
    }

    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<String>, BackendError> {
        // pdf-extract panics on some malformed inputs
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let trimmed = trim_to_pages(bytes, max_pages)?;
            pdf_extract::extract_text_from_mem_by_pages(&trimmed)
                .map_err(|e| BackendError::Extraction(format!("{:?}", e)))
        }));

        match result {
            Ok(Ok(pages)) => Ok(pages.into_iter().take(max_pages).collect()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BackendError::Panicked),
        }
    }
}

/// Drops every page after the first `max_pages` so later pages are never parsed
fn trim_to_pages(bytes: &[u8], max_pages: usize) -> Result<Cow<'_, [u8]>, BackendError> {
    let mut document = Document::load_mem(bytes).map_err(|e| BackendError::Open(e.to_string()))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    if page_numbers.len() <= max_pages {
        return Ok(Cow::Borrowed(bytes));
    }

    document.delete_pages(&page_numbers[max_pages..]);
    let mut trimmed = Vec::new();
    document
        .save_to(&mut trimmed)
        .map_err(|e| BackendError::Open(e.to_string()))?;
    Ok(Cow::Owned(trimmed))
}

/// Backend built on `lopdf`'s content stream text extraction
#[derive(Debug, Default)]
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Lopdf
    }

    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<String>, BackendError> {
        let document = Document::load_mem(bytes).map_err(|e| BackendError::Open(e.to_string()))?;
        if document.is_encrypted() {
            return Err(BackendError::Encrypted);
        }

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().take(max_pages).collect();

        let mut pages = Vec::with_capacity(page_numbers.len());
        let mut last_error = None;
        for number in page_numbers {
            match document.extract_text(&[number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::debug!("lopdf could not read page {}: {}", number, e);
                    last_error = Some(e);
                }
            }
        }

        match (pages.is_empty(), last_error) {
            (true, Some(e)) => Err(BackendError::Extraction(e.to_string())),
            _ => Ok(pages),
        }
    }
}

/// Instantiates backends from configured names, preserving order
///
/// Unknown names are skipped with a warning; validation rejects them earlier.
pub fn backends_from_names(names: &[String]) -> Vec<Arc<dyn PdfBackend>> {
    names
        .iter()
        .filter_map(|name| match ExtractionMethod::from_backend_name(name) {
            Some(ExtractionMethod::PdfExtract) => {
                Some(Arc::new(PdfExtractBackend) as Arc<dyn PdfBackend>)
            }
            Some(ExtractionMethod::Lopdf) => Some(Arc::new(LopdfBackend) as Arc<dyn PdfBackend>),
            _ => {
                tracing::warn!("Unknown PDF backend '{}', skipping", name);
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Builds a one-page PDF showing `text` in Courier
    pub(crate) fn sample_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_lopdf_reads_text() {
        let bytes = sample_pdf("Annual Report");
        let pages = LopdfBackend.extract_pages(&bytes, 20).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("Annual Report"), "got {:?}", pages);
    }

    #[test]
    fn test_lopdf_respects_page_cap() {
        let bytes = sample_pdf("Only page");
        let pages = LopdfBackend.extract_pages(&bytes, 0).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_backends_reject_garbage() {
        let garbage = b"definitely not a pdf";
        assert!(LopdfBackend.extract_pages(garbage, 20).is_err());
        assert!(PdfExtractBackend.extract_pages(garbage, 20).is_err());
    }

    #[test]
    fn test_backends_from_names_keeps_order() {
        let names = vec![
            "lopdf".to_string(),
            "pypdf".to_string(),
            "pdf-extract".to_string(),
        ];
        let methods: Vec<ExtractionMethod> = backends_from_names(&names)
            .iter()
            .map(|b| b.method())
            .collect();
        assert_eq!(
            methods,
            vec![ExtractionMethod::Lopdf, ExtractionMethod::PdfExtract]
        );
    }
}
