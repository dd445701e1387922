//! Connectivity gate and start-set discovery
//!
//! Before any page is queued the target is probed over a few scheme/host
//! variants; the first one that answers with the expected content decides the
//! protocol of the run. Without explicit start URLs, the landing page is then
//! fetched once and its site-relative links become the start set.

use crate::crawler::fetcher::{fetch_once, fetch_url, http_fallback_url, FetchError};
use crate::url::is_pdf_url;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Number of discovered URLs echoed to the log
const LOGGED_DISCOVERIES: usize = 5;

/// Derives the default probe list from the base URL
///
/// `https://host/path`, `https://host/`, `http://host/path`, `http://host/`,
/// with duplicates removed when the base URL is the site root.
pub fn connectivity_candidates(base: &Url) -> Vec<String> {
    let Some(host) = base.host_str() else {
        return vec![base.to_string()];
    };
    let authority = match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path = base.path();

    let mut candidates = Vec::new();
    for scheme in ["https", "http"] {
        for candidate in [
            format!("{}://{}{}", scheme, authority, path),
            format!("{}://{}/", scheme, authority),
        ] {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// True when `markers` is empty or the body contains one of them, ignoring case
pub fn body_has_marker(body: &str, markers: &[String]) -> bool {
    if markers.is_empty() {
        return true;
    }
    let body = body.to_lowercase();
    markers
        .iter()
        .any(|marker| body.contains(&marker.to_lowercase()))
}

/// Probes each candidate in order and returns the first reachable one
///
/// A candidate passes with status 200 and a body matching `markers`.
/// Candidates are fetched as given, without protocol fallback.
pub async fn probe_connectivity(
    client: &Client,
    candidates: &[String],
    markers: &[String],
    timeout: Duration,
) -> Option<Url> {
    for candidate in candidates {
        tracing::info!("Testing connectivity: {}", candidate);

        match fetch_once(client, candidate, timeout, None).await {
            Ok(result) if result.status_code == 200 => {
                if body_has_marker(&result.text(), markers) {
                    tracing::info!("Connected via {}", candidate);
                    return Url::parse(candidate).ok();
                }
                tracing::warn!("{} answered without any expected content marker", candidate);
            }
            Ok(result) => {
                tracing::warn!("{} answered with status {}", candidate, result.status_code);
            }
            Err(e) => {
                tracing::warn!("Connectivity probe failed: {}", e);
            }
        }
    }

    None
}

/// Collects the landing page and its site-relative links as absolute URLs
///
/// Only hrefs starting with a single `/` and longer than `/` are kept; they
/// are joined to the landing page origin. PDF links are left to the page
/// extractor. The result starts with the landing page, keeps first-seen
/// order and holds at most `limit` URLs.
pub fn site_relative_links(html: &str, landing: &Url, limit: usize) -> Vec<String> {
    let landing_url = landing.to_string();
    let mut seen = HashSet::from([landing_url.clone()]);
    let mut urls = vec![landing_url];

    let Ok(anchors) = Selector::parse("a[href]") else {
        return urls;
    };

    let origin = landing.origin().ascii_serialization();
    let document = Html::parse_document(html);

    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if !href.starts_with('/') || href.starts_with("//") || href.len() <= 1 {
            continue;
        }

        let absolute = format!("{}{}", origin, href);
        match Url::parse(&absolute) {
            Ok(url) if is_pdf_url(&url) => continue,
            Ok(_) => {}
            Err(_) => continue,
        }

        if seen.insert(absolute.clone()) {
            urls.push(absolute);
        }
    }

    urls.truncate(limit.max(1));
    urls
}

/// Fetches the landing page once and returns the discovered start set
pub async fn discover(
    client: &Client,
    landing: &Url,
    timeout: Duration,
    limit: usize,
) -> Result<Vec<String>, FetchError> {
    tracing::info!("Discovering URLs from {}", landing);

    let result = fetch_url(client, landing.as_str(), timeout).await?;
    let urls = site_relative_links(&result.text(), landing, limit);

    tracing::info!("Discovered {} URLs", urls.len());
    for url in urls.iter().take(LOGGED_DISCOVERIES) {
        tracing::info!("  {}", url);
    }

    Ok(urls)
}

/// Rewrites `https://` URLs to `http://`; anything else passes through
pub fn downgrade_to_http(urls: &[String]) -> Vec<String> {
    urls.iter()
        .map(|url| http_fallback_url(url).unwrap_or_else(|| url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_for_subpath() {
        let base = Url::parse("https://mrpl.co.in/en/").unwrap();
        assert_eq!(
            connectivity_candidates(&base),
            vec![
                "https://mrpl.co.in/en/",
                "https://mrpl.co.in/",
                "http://mrpl.co.in/en/",
                "http://mrpl.co.in/",
            ]
        );
    }

    #[test]
    fn test_candidates_for_root_are_deduplicated() {
        let base = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            connectivity_candidates(&base),
            vec!["https://127.0.0.1:8080/", "http://127.0.0.1:8080/"]
        );
    }

    #[test]
    fn test_marker_matching() {
        let markers = vec!["MRPL".to_string(), "Mangalore".to_string()];
        assert!(body_has_marker("<h1>Welcome to mangalore</h1>", &markers));
        assert!(!body_has_marker("<h1>Parked domain</h1>", &markers));
        assert!(body_has_marker("anything", &[]));
    }

    #[test]
    fn test_site_relative_links() {
        let html = r#"
            <a href="/about">About</a>
            <a href="/">Home</a>
            <a href="//cdn.example.com/x">CDN</a>
            <a href="https://other.com/page">Other</a>
            <a href="relative/page">Relative</a>
            <a href="/reports/annual.pdf">PDF</a>
            <a href="/about">About again</a>
            <a href="/contact?lang=en">Contact</a>
        "#;
        let landing = Url::parse("https://example.com/en/").unwrap();

        assert_eq!(
            site_relative_links(html, &landing, 10),
            vec![
                "https://example.com/en/",
                "https://example.com/about",
                "https://example.com/contact?lang=en",
            ]
        );
    }

    #[test]
    fn test_site_relative_links_respects_limit() {
        let html = r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#;
        let landing = Url::parse("https://example.com/").unwrap();

        let urls = site_relative_links(html, &landing, 2);
        assert_eq!(urls, vec!["https://example.com/", "https://example.com/a"]);
    }

    #[test]
    fn test_root_relative_never_doubles_host() {
        let html = r#"<a href="/path/page">P</a>"#;
        let landing = Url::parse("https://example.com:8443/start").unwrap();

        let urls = site_relative_links(html, &landing, 5);
        assert_eq!(urls[1], "https://example.com:8443/path/page");
    }

    #[test]
    fn test_downgrade_to_http() {
        let urls = vec![
            "https://example.com/a".to_string(),
            "http://example.com/b".to_string(),
        ];
        assert_eq!(
            downgrade_to_http(&urls),
            vec!["http://example.com/a", "http://example.com/b"]
        );
    }
}
