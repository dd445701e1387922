//! Configuration module for Site-Harvest
//!
//! This module handles loading, parsing, validating and clamping the TOML
//! configuration file, and applying the per-run input object on top of it.
//!
//! # Example
//!
//! ```no_run
//! use site_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawler will scrape at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, HttpConfig, OutputConfig, PdfConfig, RunInput,
    TargetConfig, MAX_PAGES_CEILING, MIN_DELAY_SECS,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_run_input, parse_config,
    prepare,
};
pub use validation::{apply_limits, validate};
