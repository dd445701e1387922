//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: the run-level state machine driven by the coordinator
//! - `PhaseTracker`: enforces legal transitions and logs each one

mod phase;

pub use phase::CrawlPhase;

use crate::HarvestError;

/// Holds the current phase and rejects illegal transitions
#[derive(Debug)]
pub struct PhaseTracker {
    current: CrawlPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: CrawlPhase::Init,
        }
    }

    pub fn current(&self) -> CrawlPhase {
        self.current
    }

    /// Moves to `next`, or fails with `InvalidTransition`
    pub fn transition(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        if !self.current.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!("Phase {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
