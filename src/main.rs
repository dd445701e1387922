//! Site-Harvest main entry point
//!
//! This is the command-line interface for the Site-Harvest content harvester.

use clap::Parser;
use site_harvest::config::{load_config_with_hash, load_run_input, prepare, Config};
use site_harvest::crawler::{run_crawl, CrawlReport};
use site_harvest::output::{
    load_statistics, print_statistics, FanoutSink, JsonLinesSink, MemorySink, RecordSink,
    SqliteSink,
};
use site_harvest::storage::{open_storage, RunStatus, SqliteStorage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Site-Harvest: a bounded single-site content harvester
///
/// Site-Harvest crawls a limited number of pages on one web site, extracts
/// their text and the text of the PDF documents they link to, and writes one
/// aggregated record per page.
#[derive(Parser, Debug)]
#[command(name = "site-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A bounded single-site content harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run input JSON file ({"max_pages", "delay", "extract_pdfs"})
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Maximum pages to scrape (capped at 50)
    #[arg(long)]
    max_pages: Option<u32>,

    /// Seconds between requests of one worker (at least 2)
    #[arg(long)]
    delay: Option<f64>,

    /// Skip PDF download and extraction
    #[arg(long)]
    no_pdfs: bool,

    /// Validate config and show the effective settings without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    apply_overrides(&cli, &mut config)?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_harvest=info,warn"),
            1 => EnvFilter::new("site_harvest=debug,info"),
            2 => EnvFilter::new("site_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Layers the run input file and then the CLI flags over the file config
fn apply_overrides(cli: &Cli, config: &mut Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.input {
        tracing::info!("Applying run input from: {}", path.display());
        load_run_input(path)?.apply(config)?;
    }

    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(delay) = cli.delay {
        config.crawler.delay = delay;
    }
    if cli.no_pdfs {
        config.crawler.extract_pdfs = false;
    }

    prepare(config)?;
    Ok(())
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Site-Harvest Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    if config.target.start_urls.is_empty() {
        println!("  Start URLs: discovered from the landing page");
    } else {
        println!("  Start URLs ({}):", config.target.start_urls.len());
        for url in &config.target.start_urls {
            println!("    * {}", url);
        }
    }
    println!("  Fallback URLs: {}", config.target.fallback_urls.len());
    if !config.target.content_markers.is_empty() {
        println!("  Content markers: {}", config.target.content_markers.join(", "));
    }

    println!("\nCrawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Delay: {}s", config.crawler.delay);
    println!("  Workers: {}", config.crawler.concurrency);
    println!("  Extract PDFs: {}", config.crawler.extract_pdfs);

    println!("\nPDF Limits:");
    println!("  Per page: {}", config.pdf.max_per_page);
    println!("  Max size: {} bytes", config.pdf.max_bytes);
    println!("  Pages read: {}", config.pdf.max_pages);
    println!("  Backends: {}", config.pdf.backends.join(" -> "));

    println!("\nOutput:");
    println!(
        "  JSON Lines: {}",
        config.output.jsonl_path.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Database: {}",
        config.output.database_path.as_deref().unwrap_or("(none)")
    );

    if config.http.accept_invalid_certs {
        println!("\n! TLS certificate verification is DISABLED for this target");
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(database_path) = &config.output.database_path else {
        return Err("No database-path configured in [output]".into());
    };

    println!("Database: {}\n", database_path);

    let storage = SqliteStorage::new(Path::new(database_path))?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No runs recorded yet"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Harvesting {} (max {} pages, {}s delay, PDFs {})",
        config.target.base_url,
        config.crawler.max_pages,
        config.crawler.delay,
        if config.crawler.extract_pdfs { "on" } else { "off" }
    );

    let mut sinks: Vec<Arc<dyn RecordSink>> = Vec::new();

    if let Some(path) = &config.output.jsonl_path {
        let sink = JsonLinesSink::create(Path::new(path)).await?;
        tracing::info!("Writing records to {}", sink.path().display());
        sinks.push(Arc::new(sink));
    }

    let sqlite = match &config.output.database_path {
        Some(path) => {
            let storage = Arc::new(Mutex::new(open_storage(Path::new(path))?));
            let sink = Arc::new(SqliteSink::start_run(
                storage,
                config_hash,
                &config.target.base_url,
            )?);
            sinks.push(sink.clone());
            Some(sink)
        }
        None => None,
    };

    if sinks.is_empty() {
        tracing::warn!("No output configured; records are kept in memory only");
        sinks.push(Arc::new(MemorySink::new()));
    }

    // Ctrl-C cancels the run; in-flight pages are released unvisited
    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            signal.cancel();
        }
    });

    let result = run_crawl(config, Arc::new(FanoutSink::new(sinks)), cancel).await;

    if let Some(sink) = &sqlite {
        let (status, counts) = match &result {
            Ok(report) if report.cancelled => (RunStatus::Cancelled, report.counts()),
            Ok(report) => (RunStatus::Completed, report.counts()),
            Err(_) => (RunStatus::Failed, sink.stored_counts()?),
        };
        sink.finish_run(status, &counts)?;
    }

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_report(report: &CrawlReport) {
    println!("\n=== Harvest Complete ===");
    println!("  Pages scraped: {}", report.pages_scraped);
    println!("  Pages skipped: {}", report.pages_skipped);
    println!(
        "  PDFs processed: {} ({} failed)",
        report.pdfs_processed, report.pdfs_failed
    );
    println!("  Elapsed: {:.1?}", report.elapsed);
    if report.cancelled {
        println!("  Run was cancelled before the frontier was exhausted");
    }
}
