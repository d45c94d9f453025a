/// Crawl state definitions for tracking per-URL progress
use std::fmt;

/// Where a discovered URL is in its fetch lifecycle
///
/// Transitions are one-way: `Queued -> InFlight -> Completed`. A URL that is
/// added out of band may go straight from `Queued` to `Completed` only via
/// the worker, never by skipping the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Discovered and waiting in the frontier
    Queued,

    /// Dispatched to a fetch worker
    InFlight,

    /// A `PageInfo` has been recorded (success or terminal failure)
    Completed,
}

impl CrawlState {
    /// Returns true while no result is available yet
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::InFlight)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::InFlight)
                | (Self::Queued, Self::Completed)
                | (Self::InFlight, Self::Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
