//! HTML parser for building page records
//!
//! This module turns a fetched HTML page into a [`PageRecord`]:
//! - Page title and meta description
//! - Body text from the first non-empty content region
//! - Links resolved against the page and classified as pdf/internal/external

use crate::config::ExtractionConfig;
use crate::record::PageRecord;
use crate::text::{char_len, normalize_and_cap};
use crate::url::{classify_link, normalize_url, resolve_href, LinkKind};
use crate::ConfigError;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Title recorded when a page has no usable `<title>`
pub const NO_TITLE: &str = "No title";

/// Elements whose text never counts as page content
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start a new line of text when rendered
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Links found on a page, classified and de-duplicated in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedLinks {
    pub internal: Vec<String>,
    pub external: Vec<String>,
    pub pdf: Vec<String>,
}

/// Output of parsing one page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The record-ready page, with capped link lists
    pub record: PageRecord,

    /// Every internal link found; these are offered to the frontier
    pub crawl_links: Vec<String>,
}

/// Parses pages using selectors compiled once from the extraction config
#[derive(Debug)]
pub struct PageExtractor {
    content_selectors: Vec<Selector>,
    title: Selector,
    description: Selector,
    anchors: Selector,
    body: Selector,
    body_char_limit: usize,
    max_internal_links: usize,
    max_external_links: usize,
}

impl PageExtractor {
    /// Compiles the configured content selectors
    ///
    /// Fails with `InvalidSelector` on the first selector that does not parse.
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        let content_selectors = config
            .content_selectors
            .iter()
            .map(|s| compile(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            content_selectors,
            title: compile("title")?,
            description: compile("meta[name='description']")?,
            anchors: compile("a[href]")?,
            body: compile("body")?,
            body_char_limit: config.body_char_limit,
            max_internal_links: config.max_internal_links,
            max_external_links: config.max_external_links,
        })
    }

    /// Parses `html` fetched from `page_url` into a page record
    ///
    /// # Arguments
    ///
    /// * `html` - The page body
    /// * `page_url` - The URL the body was served from; relative links resolve against it
    /// * `site` - The crawl target host as returned by [`crate::url::site_host`]
    /// * `status_code` - HTTP status of the fetch
    /// * `page_size_bytes` - Raw body size
    pub fn parse(
        &self,
        html: &str,
        page_url: &Url,
        site: &str,
        status_code: u16,
        page_size_bytes: usize,
    ) -> ParsedPage {
        let document = Html::parse_document(html);

        let title = self.extract_title(&document);
        let description = self.extract_description(&document);
        let web_content = self.extract_body_text(&document);
        let links = self.extract_links(&document, page_url, site);

        let total_links = links.internal.len() + links.external.len();
        let crawl_links = links.internal.clone();

        let record = PageRecord {
            url: page_url.to_string(),
            title,
            description,
            web_content_length: char_len(&web_content),
            web_content,
            internal_links: links.internal.into_iter().take(self.max_internal_links).collect(),
            external_links: links.external.into_iter().take(self.max_external_links).collect(),
            pdf_links: links.pdf,
            total_links,
            scraped_at: Utc::now(),
            status_code,
            page_size_bytes,
        };

        ParsedPage {
            record,
            crawl_links,
        }
    }

    fn extract_title(&self, document: &Html) -> String {
        document
            .select(&self.title)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string())
    }

    fn extract_description(&self, document: &Html) -> String {
        document
            .select(&self.description)
            .next()
            .and_then(|element| element.value().attr("content"))
            .map(|content| content.trim().to_string())
            .unwrap_or_default()
    }

    /// Tries each content selector in order; the first region with text wins
    fn extract_body_text(&self, document: &Html) -> String {
        for selector in &self.content_selectors {
            for element in document.select(selector) {
                let text = normalize_and_cap(&visible_text(element), self.body_char_limit);
                if !text.is_empty() {
                    return text;
                }
            }
        }

        // None of the regions had text; use the whole body, or the whole document
        let root = document
            .select(&self.body)
            .next()
            .unwrap_or_else(|| document.root_element());
        normalize_and_cap(&visible_text(root), self.body_char_limit)
    }

    fn extract_links(&self, document: &Html, page_url: &Url, site: &str) -> ClassifiedLinks {
        let mut links = ClassifiedLinks::default();
        let mut seen = HashSet::new();

        for element in document.select(&self.anchors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(resolved) = resolve_href(href, page_url) else {
                continue;
            };
            let url = normalize_url(resolved.as_str()).unwrap_or(resolved);

            if !seen.insert(url.to_string()) {
                continue;
            }

            match classify_link(&url, site) {
                LinkKind::Pdf => links.pdf.push(url.into()),
                LinkKind::Internal => links.internal.push(url.into()),
                LinkKind::External => links.external.push(url.into()),
            }
        }

        links
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

/// Collects the text under `element`, skipping script-like elements
///
/// Text nodes are concatenated as written. A space is added only around
/// block-level elements, so inline markup never splits a word.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);
    parts.concat()
}

fn collect_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            parts.push(&**text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if NON_CONTENT_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                parts.push(" ");
            }
            collect_text(child, parts);
            if block {
                parts.push(" ");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::site_host;

    fn extractor() -> PageExtractor {
        PageExtractor::new(&ExtractionConfig::default()).unwrap()
    }

    fn parse(html: &str) -> ParsedPage {
        let url = Url::parse("https://example.com/en/page").unwrap();
        extractor().parse(html, &url, &site_host("example.com"), 200, html.len())
    }

    #[test]
    fn test_extract_title() {
        let parsed = parse("<html><head><title>  Test Page  </title></head><body></body></html>");
        assert_eq!(parsed.record.title, "Test Page");
    }

    #[test]
    fn test_missing_title_uses_sentinel() {
        let parsed = parse("<html><head></head><body><p>x</p></body></html>");
        assert_eq!(parsed.record.title, NO_TITLE);

        let parsed = parse("<html><head><title>   </title></head><body></body></html>");
        assert_eq!(parsed.record.title, NO_TITLE);
    }

    #[test]
    fn test_extract_description() {
        let parsed = parse(
            r#"<html><head><meta name="description" content=" About us "></head><body></body></html>"#,
        );
        assert_eq!(parsed.record.description, "About us");

        let parsed = parse("<html><head></head><body></body></html>");
        assert_eq!(parsed.record.description, "");
    }

    #[test]
    fn test_body_falls_back_to_body_selector() {
        let parsed = parse("<html><body>Hello   World</body></html>");
        assert_eq!(parsed.record.web_content, "Hello World");
        assert_eq!(parsed.record.web_content_length, 11);
    }

    #[test]
    fn test_body_prefers_specific_region() {
        let parsed = parse(
            r#"<html><body>
                <nav>Menu</nav>
                <div class="content"><p>Main</p>
                <p>text</p></div>
            </body></html>"#,
        );
        assert_eq!(parsed.record.web_content, "Main text");
    }

    #[test]
    fn test_empty_region_is_skipped() {
        let parsed = parse(
            r#"<html><body><div class="main-content">   </div><main>Real content</main></body></html>"#,
        );
        assert_eq!(parsed.record.web_content, "Real content");
    }

    #[test]
    fn test_inline_markup_keeps_words_together() {
        let parsed = parse("<html><body><p>Hello <b>World</b>! H<sub>2</sub>O</p></body></html>");
        assert_eq!(parsed.record.web_content, "Hello World! H2O");
    }

    #[test]
    fn test_adjacent_blocks_are_separated() {
        let parsed = parse(
            "<html><body><h1>Title</h1><p>One</p><ul><li>a</li><li>b</li></ul></body></html>",
        );
        assert_eq!(parsed.record.web_content, "Title One a b");
    }

    #[test]
    fn test_scripts_are_not_content() {
        let parsed = parse(
            "<html><body><script>var x = 1;</script><style>p{}</style><p>Visible</p></body></html>",
        );
        assert_eq!(parsed.record.web_content, "Visible");
    }

    #[test]
    fn test_body_is_capped() {
        let long = "word ".repeat(2000);
        let parsed = parse(&format!("<html><body>{}</body></html>", long));
        assert!(parsed.record.web_content.chars().count() <= 3000);
        assert_eq!(parsed.record.web_content_length, parsed.record.web_content.chars().count());
    }

    #[test]
    fn test_link_classification() {
        let parsed = parse(
            r##"<html><body>
                <a href="/about">About</a>
                <a href="contact">Contact</a>
                <a href="https://www.example.com/news">News</a>
                <a href="https://other.org/">Other</a>
                <a href="/docs/Report.PDF">Report</a>
                <a href="mailto:info@example.com">Mail</a>
                <a href="#top">Top</a>
            </body></html>"##,
        );
        let record = &parsed.record;

        assert_eq!(
            record.internal_links,
            vec![
                "https://example.com/about",
                "https://example.com/en/contact",
                "https://www.example.com/news",
            ]
        );
        assert_eq!(record.external_links, vec!["https://other.org/"]);
        assert_eq!(record.pdf_links, vec!["https://example.com/docs/Report.PDF"]);
        assert_eq!(record.total_links, 4);
    }

    #[test]
    fn test_links_are_deduplicated() {
        let parsed = parse(
            r#"<html><body>
                <a href="/a">A</a><a href="/a#section">A again</a><a href="https://example.com/a">A abs</a>
            </body></html>"#,
        );
        assert_eq!(parsed.crawl_links, vec!["https://example.com/a"]);
    }

    #[test]
    fn test_link_caps_only_affect_record() {
        let anchors: String = (0..20)
            .map(|i| format!(r#"<a href="/p{i}">p</a><a href="https://ext{i}.org/">e</a>"#))
            .collect();
        let parsed = parse(&format!("<html><body>{}</body></html>", anchors));

        assert_eq!(parsed.record.internal_links.len(), 15);
        assert_eq!(parsed.record.external_links.len(), 5);
        assert_eq!(parsed.record.total_links, 40);
        assert_eq!(parsed.crawl_links.len(), 20);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = ExtractionConfig {
            content_selectors: vec!["div[".to_string()],
            ..ExtractionConfig::default()
        };
        assert!(matches!(
            PageExtractor::new(&config),
            Err(ConfigError::InvalidSelector(_))
        ));
    }
}
