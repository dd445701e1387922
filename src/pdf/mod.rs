//! PDF document extraction
//!
//! - `backend`: the [`PdfBackend`] trait and its `pdf-extract` / `lopdf` implementations
//! - `extractor`: bounded download plus the ordered backend fallback

mod backend;
mod extractor;

pub use backend::{backends_from_names, BackendError, LopdfBackend, PdfBackend, PdfExtractBackend};
pub use extractor::{extract_text, PdfExtractor, NO_TEXT_EXTRACTED};
