//! URL handling module for Site-Harvest
//!
//! This module provides URL normalization, href resolution, same-site
//! checks and link classification.

mod domain;
mod normalize;
mod resolve;

use ::url::Url;

// Re-export main functions
pub use domain::{is_same_site, site_host};
pub use normalize::normalize_url;
pub use resolve::{is_pdf_url, resolve_href};

/// Link classification types
///
/// Every resolved link falls into exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Link to a PDF document (any host)
    Pdf,
    /// Link on the crawl target's own site - fed to the frontier
    Internal,
    /// Link to any other http(s) site - recorded only
    External,
}

/// Classifies an absolute link relative to the crawl target's site
///
/// The PDF check comes first, so a PDF hosted on the target site is `Pdf`
/// and never `Internal`.
///
/// # Arguments
///
/// * `url` - The resolved absolute URL
/// * `site` - The crawl target host, as returned by [`site_host`]
///
/// # Examples
///
/// ```
/// use site_harvest::url::{classify_link, site_host, LinkKind};
/// use url::Url;
///
/// let site = site_host("example.com");
/// let url = Url::parse("https://example.com/about").unwrap();
/// assert_eq!(classify_link(&url, &site), LinkKind::Internal);
/// ```
pub fn classify_link(url: &Url, site: &str) -> LinkKind {
    if is_pdf_url(url) {
        LinkKind::Pdf
    } else if is_same_site(url, site) {
        LinkKind::Internal
    } else {
        LinkKind::External
    }
}
