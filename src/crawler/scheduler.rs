//! Scheduler for sharing the frontier between workers and pacing requests
//!
//! This module handles:
//! - Handing frontier URLs to concurrent workers
//! - Waking idle workers when new links arrive or pages finish
//! - Per-worker minimum spacing between request starts
//! - Stopping promptly on cancellation

use super::frontier::{CrawlTarget, Frontier, FrontierStats};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Frontier shared by all workers of a run
///
/// Workers that find the queue empty while other pages are still in flight
/// park on a [`Notify`] until a page completes, since that page may add links.
pub struct SharedFrontier {
    inner: Mutex<Frontier>,
    changed: Notify,
}

impl SharedFrontier {
    pub fn new(frontier: Frontier) -> Self {
        Self {
            inner: Mutex::new(frontier),
            changed: Notify::new(),
        }
    }

    /// Waits for the next URL to fetch
    ///
    /// # Returns
    ///
    /// * `Some(CrawlTarget)` - A claimed URL; the caller must `complete` or `abandon` it
    /// * `None` - The frontier is finished or the run was cancelled
    pub async fn claim(&self, cancel: &CancellationToken) -> Option<CrawlTarget> {
        loop {
            // Registered before inspecting state so a completion between the
            // check and the await is not missed
            let notified = self.changed.notified();

            {
                let mut frontier = self.inner.lock().await;
                if cancel.is_cancelled() {
                    return None;
                }
                if let Some(target) = frontier.next() {
                    return Some(target);
                }
                if frontier.is_finished() {
                    return None;
                }
            }

            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Finishes a claimed URL and offers the internal links found on it
    ///
    /// Returns how many of the links were queued.
    pub async fn complete(&self, url: &Url, success: bool, links: &[String]) -> usize {
        let queued = {
            let mut frontier = self.inner.lock().await;
            let queued = links
                .iter()
                .filter(|link| frontier.offer(link, Some(url.as_str())).is_queued())
                .count();
            frontier.complete(url, success);
            queued
        };
        self.changed.notify_waiters();
        queued
    }

    /// Releases a claimed URL without visiting it
    pub async fn abandon(&self, url: &Url) {
        self.inner.lock().await.abandon(url);
        self.changed.notify_waiters();
    }

    /// Marks a URL reached by redirect from `from` as visited
    ///
    /// Returns false if it was already visited or is in flight on another worker.
    pub async fn claim_redirect(&self, from: &Url, target: &str) -> bool {
        self.inner.lock().await.claim_redirect(from, target)
    }

    pub async fn stats(&self) -> FrontierStats {
        self.inner.lock().await.stats()
    }
}

/// Enforces a minimum interval between the starts of one worker's requests
///
/// The first request starts immediately and nothing is slept after the last,
/// so a run never ends with an idle delay.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_start: Option<Instant>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: None,
        }
    }

    /// Time left before the next request may start
    pub fn time_until_ready(&self, now: Instant) -> Duration {
        match self.last_start {
            Some(last) => (last + self.min_interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Sleeps until the next request may start, then records the start
    ///
    /// Returns `false` without recording if cancelled while waiting.
    pub async fn pace(&mut self, cancel: &CancellationToken) -> bool {
        let wait = self.time_until_ready(Instant::now());

        if !wait.is_zero() {
            tracing::debug!("Waiting {:?} before next request", wait);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return false,
            }
        }

        self.last_start = Some(Instant::now());
        true
    }
}
