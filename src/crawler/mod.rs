//! Crawler module for single-site page acquisition
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a single https -> http fallback
//! - The connectivity gate and start-set discovery
//! - The frontier of discovered and visited URLs
//! - HTML parsing into page records
//! - Worker scheduling, pacing and overall run coordination

mod coordinator;
mod discovery;
mod fetcher;
mod frontier;
mod parser;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use discovery::{
    body_has_marker, connectivity_candidates, discover, downgrade_to_http, probe_connectivity,
    site_relative_links,
};
pub use fetcher::{
    advertised_length, build_http_client, fetch_limited, fetch_once, fetch_url, FetchError,
    FetchResult,
};
pub use frontier::{CrawlTarget, Frontier, FrontierStats, OfferOutcome};
pub use parser::{ClassifiedLinks, PageExtractor, ParsedPage, NO_TITLE};
pub use scheduler::{RequestPacer, SharedFrontier};
