use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Upper bound applied to `max-pages` before a crawl starts
pub const MAX_PAGES_CEILING: u32 = 50;

/// Lower bound (seconds) applied to the inter-request `delay`
pub const MIN_DELAY_SECS: f64 = 2.0;

/// Main configuration structure for Site-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub target: TargetConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds a configuration with every section at its default for `base_url`
    pub fn for_target(base_url: impl Into<String>) -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            target: TargetConfig {
                base_url: base_url.into(),
                ..TargetConfig::default()
            },
            http: HttpConfig::default(),
            extraction: ExtractionConfig::default(),
            pdf: PdfConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Crawl budget and pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of pages to scrape (clamped to [`MAX_PAGES_CEILING`])
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Minimum seconds between request starts of one worker
    pub delay: f64,

    /// Whether linked PDF documents are downloaded and extracted
    #[serde(rename = "extract-pdfs")]
    pub extract_pdfs: bool,

    /// Bound on the frontier's pending queue
    #[serde(rename = "max-pending")]
    pub max_pending: usize,

    /// Number of concurrent crawl workers
    pub concurrency: usize,
}

impl CrawlerConfig {
    pub fn delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.delay.max(0.0))
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            delay: 3.0,
            extract_pdfs: true,
            max_pending: 50,
            concurrency: 1,
        }
    }
}

/// The single site being harvested
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    /// Landing page; also defines the site whose links count as internal
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Explicit start set. When empty, URLs are discovered from the landing page
    #[serde(rename = "start-urls", default)]
    pub start_urls: Vec<String>,

    /// Used when discovery from the landing page fails
    #[serde(rename = "fallback-urls", default)]
    pub fallback_urls: Vec<String>,

    /// Scheme/host variants probed before crawling. Derived from `base-url` when empty
    #[serde(rename = "connectivity-urls", default)]
    pub connectivity_urls: Vec<String>,

    /// At least one must appear (case-insensitive) in a connectivity probe body
    #[serde(rename = "content-markers", default)]
    pub content_markers: Vec<String>,
}

/// HTTP client behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Disables certificate and hostname verification. Only for a known target
    /// whose TLS setup is broken; logged loudly whenever a client is built.
    #[serde(rename = "accept-invalid-certs")]
    pub accept_invalid_certs: bool,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Additional request headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Page fetch timeout (seconds)
    #[serde(rename = "page-timeout")]
    pub page_timeout: u64,

    /// Connectivity probe timeout (seconds)
    #[serde(rename = "connectivity-timeout")]
    pub connectivity_timeout: u64,

    /// PDF download timeout (seconds)
    #[serde(rename = "pdf-timeout")]
    pub pdf_timeout: u64,

    /// TCP/TLS connect timeout (seconds)
    #[serde(rename = "connect-timeout")]
    pub connect_timeout: u64,
}

impl HttpConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout)
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout)
    }

    pub fn pdf_timeout(&self) -> Duration {
        Duration::from_secs(self.pdf_timeout)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let headers = [
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
            ),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Upgrade-Insecure-Requests", "1"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Cache-Control", "max-age=0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            accept_invalid_certs: false,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            headers,
            page_timeout: 30,
            connectivity_timeout: 15,
            pdf_timeout: 60,
            connect_timeout: 10,
        }
    }
}

/// Page content extraction limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Content-region selectors, most specific first
    #[serde(rename = "content-selectors")]
    pub content_selectors: Vec<String>,

    #[serde(rename = "body-char-limit")]
    pub body_char_limit: usize,

    #[serde(rename = "max-internal-links")]
    pub max_internal_links: usize,

    #[serde(rename = "max-external-links")]
    pub max_external_links: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            content_selectors: [
                ".main-content",
                ".content",
                "main",
                ".page-content",
                "article",
                ".container",
                "body",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            body_char_limit: 3000,
            max_internal_links: 15,
            max_external_links: 5,
        }
    }
}

/// PDF download and extraction limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// PDFs processed per page, in link-discovery order
    #[serde(rename = "max-per-page")]
    pub max_per_page: usize,

    /// Download size cap in bytes
    #[serde(rename = "max-bytes")]
    pub max_bytes: u64,

    /// Pages read per document
    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    /// Character cap on extracted text
    #[serde(rename = "char-limit")]
    pub char_limit: usize,

    /// Pause between PDF downloads on the same page (seconds)
    pub delay: f64,

    /// Extraction backends in the order they are tried
    pub backends: Vec<String>,
}

impl PdfConfig {
    pub fn delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.delay.max(0.0))
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_per_page: 5,
            max_bytes: 50 * 1024 * 1024,
            max_pages: 20,
            char_limit: 5000,
            delay: 1.0,
            backends: vec!["pdf-extract".to_string(), "lopdf".to_string()],
        }
    }
}

/// Where aggregated records are written
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// JSON Lines dataset file (one record per line)
    #[serde(rename = "jsonl-path", default)]
    pub jsonl_path: Option<String>,

    /// SQLite dataset database
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

/// Run input object: the per-run overrides accepted as JSON
///
/// ```json
/// { "max_pages": 20, "delay": 2.5, "extract_pdfs": false }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunInput {
    pub max_pages: Option<i64>,
    pub delay: Option<f64>,
    pub extract_pdfs: Option<bool>,
}
