//! Site-Harvest: a bounded single-site content harvester
//!
//! This crate crawls a bounded set of pages on one web site, extracts
//! normalized text from each page and from the PDF documents it links to,
//! and hands one aggregated record per page to a pluggable sink.

pub mod config;
pub mod crawler;
pub mod output;
pub mod pdf;
pub mod record;
pub mod state;
pub mod storage;
pub mod text;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No reachable address for the target site (tried: {})", attempted.join(", "))]
    Connectivity { attempted: Vec<String> },

    #[error("No URLs to crawl after discovery from {from}")]
    NoTargets { from: String },

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Sink rejected record: {0}")]
    Sink(#[from] output::SinkError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse run input: {0}")]
    Input(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid content selector: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Site-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{AggregatedRecord, ExtractionMethod, PageRecord, PdfDocument};
pub use state::CrawlPhase;
pub use url::{normalize_url, resolve_href};
