//! Crawler coordinator - run orchestration
//!
//! Drives one harvest run through its phases:
//! - Probing the target until one scheme/host variant answers
//! - Seeding the frontier from start URLs, discovery, or the fallback list
//! - Running the worker pool that fetches, extracts and hands off records
//! - Flushing the sink and reporting totals

use crate::config::Config;
use crate::crawler::discovery::{
    connectivity_candidates, discover, downgrade_to_http, probe_connectivity,
};
use crate::crawler::fetcher::{build_http_client, fetch_url};
use crate::crawler::frontier::{CrawlTarget, Frontier};
use crate::crawler::parser::PageExtractor;
use crate::crawler::scheduler::{RequestPacer, SharedFrontier};
use crate::output::RecordSink;
use crate::pdf::PdfExtractor;
use crate::record::AggregatedRecord;
use crate::state::{CrawlPhase, PhaseTracker};
use crate::storage::RunCounts;
use crate::url::site_host;
use crate::HarvestError;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Totals of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    /// Pages whose record reached the sink
    pub pages_scraped: u64,

    /// Pages that failed to fetch
    pub pages_skipped: u64,

    /// PDF documents attempted, including failures
    pub pdfs_processed: u64,

    /// PDF documents that produced no text
    pub pdfs_failed: u64,

    pub elapsed: Duration,

    /// True if the run stopped on its cancellation signal
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn counts(&self) -> RunCounts {
        RunCounts {
            pages_scraped: self.pages_scraped,
            pages_skipped: self.pages_skipped,
            pdfs_processed: self.pdfs_processed,
            pdfs_failed: self.pdfs_failed,
        }
    }
}

/// Counters shared by the workers of one run
#[derive(Debug, Default)]
struct Tally {
    pages_scraped: AtomicU64,
    pages_skipped: AtomicU64,
    pdfs_processed: AtomicU64,
    pdfs_failed: AtomicU64,
}

impl Tally {
    fn record(&self, record: &AggregatedRecord) {
        let failed = record
            .pdf_documents
            .iter()
            .filter(|doc| doc.is_failed())
            .count() as u64;

        self.pages_scraped.fetch_add(1, Ordering::Relaxed);
        self.pdfs_processed
            .fetch_add(record.pdf_documents.len() as u64, Ordering::Relaxed);
        self.pdfs_failed.fetch_add(failed, Ordering::Relaxed);
    }

    fn skip(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self, elapsed: Duration, cancelled: bool) -> CrawlReport {
        CrawlReport {
            pages_scraped: self.pages_scraped.load(Ordering::Relaxed),
            pages_skipped: self.pages_skipped.load(Ordering::Relaxed),
            pdfs_processed: self.pdfs_processed.load(Ordering::Relaxed),
            pdfs_failed: self.pdfs_failed.load(Ordering::Relaxed),
            elapsed,
            cancelled,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    client: Client,
    extractor: Arc<PageExtractor>,
    pdf: Option<Arc<PdfExtractor>>,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationToken,
    phase: PhaseTracker,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - A validated, clamped configuration
    /// * `sink` - Receives one record per scraped page
    /// * `cancel` - Run-scoped cancellation signal
    pub fn new(
        config: Config,
        sink: Arc<dyn RecordSink>,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.http)?;
        let extractor = PageExtractor::new(&config.extraction)?;
        let pdf = config
            .crawler
            .extract_pdfs
            .then(|| Arc::new(PdfExtractor::new(client.clone(), &config.pdf, &config.http)));

        Ok(Self {
            config: Arc::new(config),
            client,
            extractor: Arc::new(extractor),
            pdf,
            sink,
            cancel,
            phase: PhaseTracker::new(),
        })
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase.current()
    }

    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run finished, possibly cancelled part way
    /// * `Err(HarvestError)` - Connectivity failed, nothing could be queued,
    ///   or the sink rejected a record
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let started = Instant::now();
        let result = self.run_phases(started).await;

        if !self.phase.current().is_terminal() {
            self.phase.transition(CrawlPhase::Done)?;
        }

        match &result {
            Ok(report) => {
                tracing::info!(
                    "Harvest finished: {} pages scraped, {} skipped, {} PDFs processed ({} failed) in {:.1?}{}",
                    report.pages_scraped,
                    report.pages_skipped,
                    report.pdfs_processed,
                    report.pdfs_failed,
                    report.elapsed,
                    if report.cancelled { " (cancelled)" } else { "" }
                );
            }
            Err(e) => tracing::error!("Harvest aborted: {}", e),
        }

        result
    }

    async fn run_phases(&mut self, started: Instant) -> Result<CrawlReport, HarvestError> {
        let tally = Arc::new(Tally::default());

        self.phase.transition(CrawlPhase::ConnectivityCheck)?;
        let Some(reachable) = self.check_connectivity().await? else {
            return Ok(tally.report(started.elapsed(), true));
        };

        self.phase.transition(CrawlPhase::Discovering)?;
        let downgrade = reachable.scheme() == "http";
        if downgrade {
            tracing::info!("Target only reachable over HTTP, switching start URLs to http");
        }
        let Some(start_urls) = self.discover_targets(downgrade).await? else {
            return Ok(tally.report(started.elapsed(), true));
        };

        let crawler = &self.config.crawler;
        let mut frontier = Frontier::new(crawler.max_pending, crawler.max_pages as usize);
        let seeded = frontier.seed(&start_urls);
        if seeded == 0 {
            return Err(HarvestError::NoTargets {
                from: self.config.target.base_url.clone(),
            });
        }
        tracing::info!("Queued {} start URLs", seeded);

        self.phase.transition(CrawlPhase::Crawling)?;
        let failure = self
            .crawl(Arc::new(SharedFrontier::new(frontier)), Arc::clone(&tally))
            .await;

        let cancelled = self.cancel.is_cancelled();
        self.phase.transition(CrawlPhase::Done)?;

        if let Some(e) = failure {
            return Err(e);
        }
        self.sink.flush().await?;

        Ok(tally.report(started.elapsed(), cancelled))
    }

    /// Finds the first reachable variant of the target
    ///
    /// Returns `Ok(None)` when cancelled while probing.
    async fn check_connectivity(&self) -> Result<Option<Url>, HarvestError> {
        let target = &self.config.target;
        let candidates = if target.connectivity_urls.is_empty() {
            connectivity_candidates(&Url::parse(&target.base_url)?)
        } else {
            target.connectivity_urls.clone()
        };

        let probe = probe_connectivity(
            &self.client,
            &candidates,
            &target.content_markers,
            self.config.http.connectivity_timeout(),
        );

        let reachable = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(None),
            reachable = probe => reachable,
        };

        match reachable {
            Some(url) => Ok(Some(url)),
            None => Err(HarvestError::Connectivity {
                attempted: candidates,
            }),
        }
    }

    /// Builds the start set: configured start URLs, else discovery, else the fallback list
    ///
    /// Returns `Ok(None)` when cancelled while discovering.
    async fn discover_targets(&self, downgrade: bool) -> Result<Option<Vec<String>>, HarvestError> {
        let target = &self.config.target;
        let rewrite = |urls: &[String]| {
            if downgrade {
                downgrade_to_http(urls)
            } else {
                urls.to_vec()
            }
        };

        if !target.start_urls.is_empty() {
            tracing::info!("Using {} configured start URLs", target.start_urls.len());
            return Ok(Some(rewrite(&target.start_urls)));
        }

        let base = rewrite(std::slice::from_ref(&target.base_url));
        let landing = Url::parse(&base[0])?;
        let discovery = discover(
            &self.client,
            &landing,
            self.config.http.page_timeout(),
            self.config.crawler.max_pages as usize,
        );

        let urls = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(None),
            discovered = discovery => match discovered {
                Ok(urls) => urls,
                Err(e) => {
                    tracing::warn!(
                        "Discovery failed ({}), using {} fallback URLs",
                        e,
                        target.fallback_urls.len()
                    );
                    rewrite(&target.fallback_urls)
                }
            },
        };

        if urls.is_empty() {
            return Err(HarvestError::NoTargets {
                from: landing.to_string(),
            });
        }
        Ok(Some(urls))
    }

    /// Runs the worker pool until the frontier is finished
    ///
    /// Returns the first worker failure; a failure stops the other workers.
    async fn crawl(&self, frontier: Arc<SharedFrontier>, tally: Arc<Tally>) -> Option<HarvestError> {
        let stop = self.cancel.child_token();
        let site = Url::parse(&self.config.target.base_url)
            .ok()
            .and_then(|url| url.host_str().map(site_host))
            .unwrap_or_default();

        let concurrency = self.config.crawler.concurrency.max(1);
        tracing::info!("Starting {} crawl worker(s)", concurrency);

        let mut workers = JoinSet::new();
        for id in 0..concurrency {
            let worker = Worker {
                id,
                client: self.client.clone(),
                extractor: Arc::clone(&self.extractor),
                pdf: self.pdf.clone(),
                sink: Arc::clone(&self.sink),
                frontier: Arc::clone(&frontier),
                tally: Arc::clone(&tally),
                stop: stop.clone(),
                site: site.clone(),
                page_timeout: self.config.http.page_timeout(),
                delay: self.config.crawler.delay_duration(),
            };
            workers.spawn(worker.run());
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let error = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => HarvestError::Worker(e.to_string()),
            };
            tracing::error!("Stopping crawl: {}", error);
            stop.cancel();
            failure.get_or_insert(error);
        }

        let stats = frontier.stats().await;
        tracing::debug!(
            "Frontier at shutdown: {} visited, {} pending, {} in flight",
            stats.visited,
            stats.pending,
            stats.in_flight
        );

        failure
    }
}

/// One crawl worker: claims URLs and turns each into a record
struct Worker {
    id: usize,
    client: Client,
    extractor: Arc<PageExtractor>,
    pdf: Option<Arc<PdfExtractor>>,
    sink: Arc<dyn RecordSink>,
    frontier: Arc<SharedFrontier>,
    tally: Arc<Tally>,
    stop: CancellationToken,
    site: String,
    page_timeout: Duration,
    delay: Duration,
}

impl Worker {
    async fn run(self) -> Result<(), HarvestError> {
        let mut pacer = RequestPacer::new(self.delay);

        while let Some(target) = self.frontier.claim(&self.stop).await {
            if !pacer.pace(&self.stop).await {
                self.frontier.abandon(&target.url).await;
                break;
            }
            if !self.process(&target).await? {
                break;
            }
        }

        tracing::debug!("Worker {} finished", self.id);
        Ok(())
    }

    /// Fetches, extracts and hands off one page
    ///
    /// Returns `Ok(false)` if the run was cancelled before the record was built;
    /// the URL is then released without being visited.
    async fn process(&self, target: &CrawlTarget) -> Result<bool, HarvestError> {
        let url = &target.url;
        tracing::info!("Scraping: {}", url);

        let fetched = tokio::select! {
            fetched = fetch_url(&self.client, url.as_str(), self.page_timeout) => Some(fetched),
            _ = self.stop.cancelled() => None,
        };
        let Some(fetched) = fetched else {
            self.frontier.abandon(url).await;
            return Ok(false);
        };

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                self.tally.skip();
                self.frontier.complete(url, false, &[]).await;
                return Ok(true);
            }
        };

        if page.final_url != *url
            && !self.frontier.claim_redirect(url, page.final_url.as_str()).await
        {
            tracing::info!("{} redirected to already handled {}", url, page.final_url);
            self.tally.skip();
            self.frontier.complete(url, false, &[]).await;
            return Ok(true);
        }

        let parsed = self.extractor.parse(
            &page.text(),
            &page.final_url,
            &self.site,
            page.status_code,
            page.body.len(),
        );

        let documents = match &self.pdf {
            Some(pdf) if !parsed.record.pdf_links.is_empty() => {
                pdf.extract_all(&parsed.record.pdf_links, &self.stop).await
            }
            _ => Vec::new(),
        };
        if self.stop.is_cancelled() {
            self.frontier.abandon(url).await;
            return Ok(false);
        }

        let record = AggregatedRecord::assemble(parsed.record, documents);
        if let Err(e) = self.sink.push(&record).await {
            self.frontier.abandon(url).await;
            return Err(e.into());
        }
        self.tally.record(&record);

        let queued = self.frontier.complete(url, true, &parsed.crawl_links).await;
        tracing::info!(
            "Scraped {}: {} chars, {} PDFs, {} new links queued",
            record.page.url,
            record.total_text_length,
            record.pdf_count,
            queued
        );

        Ok(true)
    }
}

/// Runs a complete harvest with a fresh coordinator
///
/// # Example
///
/// ```no_run
/// use site_harvest::config::load_config;
/// use site_harvest::crawler::run_crawl;
/// use site_harvest::output::MemorySink;
/// use std::path::Path;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let sink = Arc::new(MemorySink::new());
/// let report = run_crawl(config, sink.clone(), CancellationToken::new()).await?;
/// println!("{} pages, {} records", report.pages_scraped, sink.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationToken,
) -> Result<CrawlReport, HarvestError> {
    let mut coordinator = Coordinator::new(config, sink, cancel)?;
    coordinator.run().await
}
