//! Crawl frontier: which URLs have been seen, which are waiting, which are in flight
//!
//! The frontier owns three disjoint sets keyed by normalized URL:
//! - *visited*: URLs whose fetch finished (successfully or not); never re-queued
//! - *pending*: a bounded FIFO of URLs waiting to be claimed
//! - *claimed*: URLs a worker is fetching right now
//!
//! The page budget counts successfully processed pages plus claimed ones, so
//! concurrent workers can never overshoot it and a failed page frees its slot.

use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting in, or claimed from, the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Normalized URL; also the frontier identity
    pub url: Url,

    /// The page this URL was found on, `None` for seeds
    pub discovered_from: Option<String>,

    /// Discovery sequence number, increasing across the run
    pub order: u64,
}

/// What happened to a URL offered to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Queued,
    AlreadyVisited,
    AlreadyQueued,
    InFlight,
    QueueFull,
    Invalid,
}

impl OfferOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Counters describing the frontier at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub visited: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub pages_done: usize,
}

/// Deduplicating, bounded crawl queue with a page budget
#[derive(Debug)]
pub struct Frontier {
    visited: HashSet<String>,
    pending: VecDeque<CrawlTarget>,
    queued: HashSet<String>,
    claimed: HashSet<String>,
    max_pending: usize,
    page_budget: usize,
    pages_done: usize,
    next_order: u64,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_pending` - Bound on the pending queue
    /// * `page_budget` - Number of successfully processed pages after which
    ///   nothing more is handed out
    pub fn new(max_pending: usize, page_budget: usize) -> Self {
        Self {
            visited: HashSet::new(),
            pending: VecDeque::new(),
            queued: HashSet::new(),
            claimed: HashSet::new(),
            max_pending,
            page_budget,
            pages_done: 0,
            next_order: 0,
        }
    }

    /// Offers each start URL in order; returns how many were queued
    pub fn seed<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        urls.into_iter()
            .filter(|url| self.offer(url.as_ref(), None).is_queued())
            .count()
    }

    /// Offers a URL for crawling
    ///
    /// Rejected when it does not normalize, was already visited, is already
    /// pending or in flight, or the pending queue is full.
    pub fn offer(&mut self, url: &str, discovered_from: Option<&str>) -> OfferOutcome {
        let Ok(url) = normalize_url(url) else {
            return OfferOutcome::Invalid;
        };
        let key = url.to_string();

        if self.visited.contains(&key) {
            return OfferOutcome::AlreadyVisited;
        }
        if self.claimed.contains(&key) {
            return OfferOutcome::InFlight;
        }
        if self.queued.contains(&key) {
            return OfferOutcome::AlreadyQueued;
        }
        if self.pending.len() >= self.max_pending {
            tracing::debug!("Frontier full ({}), dropping {}", self.max_pending, key);
            return OfferOutcome::QueueFull;
        }

        self.queued.insert(key);
        self.pending.push_back(CrawlTarget {
            url,
            discovered_from: discovered_from.map(str::to_string),
            order: self.next_order,
        });
        self.next_order += 1;
        OfferOutcome::Queued
    }

    /// Claims the oldest pending URL
    ///
    /// Returns `None` when the queue is empty or the budget is spoken for by
    /// finished and in-flight pages.
    pub fn next(&mut self) -> Option<CrawlTarget> {
        if self.budget_reached() {
            return None;
        }

        while let Some(target) = self.pending.pop_front() {
            let key = target.url.to_string();
            self.queued.remove(&key);

            if self.visited.contains(&key) || self.claimed.contains(&key) {
                continue;
            }

            self.claimed.insert(key);
            return Some(target);
        }

        None
    }

    /// Records the end of a claimed URL's fetch and marks it visited
    ///
    /// Only successful pages count against the budget.
    pub fn complete(&mut self, url: &Url, success: bool) {
        let key = url.to_string();
        self.claimed.remove(&key);
        self.visited.insert(key);
        if success {
            self.pages_done += 1;
        }
    }

    /// Releases a claimed URL without visiting it (the run is being cancelled)
    pub fn abandon(&mut self, url: &Url) {
        self.claimed.remove(url.as_str());
    }

    /// Adds a URL to the visited set; repeated calls are no-ops
    ///
    /// Returns true if the URL was not visited before.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        match normalize_url(url) {
            Ok(url) => self.visited.insert(url.to_string()),
            Err(_) => false,
        }
    }

    /// Takes ownership of the page a claimed URL redirected to
    ///
    /// Marks `target` visited and returns true, unless it was already visited
    /// or another worker has it claimed. A target that normalizes to `from`
    /// itself is always accepted.
    pub fn claim_redirect(&mut self, from: &Url, target: &str) -> bool {
        let Ok(target) = normalize_url(target) else {
            return false;
        };
        let key = target.to_string();

        if key == from.as_str() {
            return true;
        }
        if self.claimed.contains(&key) {
            return false;
        }
        self.visited.insert(key)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        normalize_url(url).map_or(false, |url| self.visited.contains(url.as_str()))
    }

    /// True once finished plus in-flight pages fill the budget
    pub fn budget_reached(&self) -> bool {
        self.pages_done + self.claimed.len() >= self.page_budget
    }

    /// True when no more work can ever be handed out
    pub fn is_finished(&self) -> bool {
        self.pages_done >= self.page_budget || (self.pending.is_empty() && self.claimed.is_empty())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pages_done(&self) -> usize {
        self.pages_done
    }

    pub fn stats(&self) -> FrontierStats {
        FrontierStats {
            visited: self.visited.len(),
            pending: self.pending.len(),
            in_flight: self.claimed.len(),
            pages_done: self.pages_done,
        }
    }
}
