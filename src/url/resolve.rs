use url::Url;

/// Resolves a link href to an absolute http(s) URL
///
/// Handles root-relative (`/about`), fully-qualified (`https://...`),
/// protocol-relative (`//host/x`) and document-relative (`next.html`) forms.
///
/// Returns `None` if the link should be excluded:
/// - empty hrefs and fragment-only anchors
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - hrefs that do not resolve, or resolve to a non-HTTP(S) scheme
///
/// # Examples
///
/// ```
/// use site_harvest::url::resolve_href;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/en/index.html").unwrap();
/// let url = resolve_href("/Parent/About_us", &base).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/Parent/About_us");
/// ```
pub fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url)
        }
        _ => None,
    }
}

/// Returns true if the URL path ends in `.pdf` (case-insensitive)
///
/// Query strings and fragments are ignored, so `report.PDF?dl=1` counts.
pub fn is_pdf_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}
