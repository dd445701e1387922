/// Crawl phase definitions for the pipeline state machine
///
/// A run moves strictly forward:
/// `Init -> ConnectivityCheck -> Discovering -> Crawling -> Done`.
/// Any phase may jump straight to `Done` (abort or cancellation).
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Run created, nothing contacted yet
    Init,

    /// Probing scheme/host variants of the target
    ConnectivityCheck,

    /// Populating the frontier from start URLs or the landing page
    Discovering,

    /// Workers are fetching and extracting pages
    Crawling,

    /// Run finished, aborted or cancelled
    Done,
}

impl CrawlPhase {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        match (self, next) {
            (Self::Done, _) => false,
            (_, Self::Done) => true,
            (Self::Init, Self::ConnectivityCheck)
            | (Self::ConnectivityCheck, Self::Discovering)
            | (Self::Discovering, Self::Crawling) => true,
            _ => false,
        }
    }

    /// Converts the phase to a short string used in logs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ConnectivityCheck => "connectivity_check",
            Self::Discovering => "discovering",
            Self::Crawling => "crawling",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
