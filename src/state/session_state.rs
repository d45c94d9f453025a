use std::fmt;

/// Lifecycle state of the crawl controller
///
/// ```text
/// Idle ──start──▶ Crawling ──pause──▶ Paused ──resume/start──▶ Crawling
///                    │  ▲
///         drained    ▼  │ add_additional_url
///                  Finished
/// any ──cancel──▶ Cancelled ──start──▶ Crawling
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapperState {
    /// No session has been started
    Idle,

    /// Fetches are being dispatched
    Crawling,

    /// In-flight fetches finish, nothing new is dispatched
    Paused,

    /// The frontier drained; the session and its results are kept
    Finished,

    /// The session was discarded; a new `start` is required
    Cancelled,
}

impl MapperState {
    /// Returns true if a session (and its page store) exists in this state
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Crawling | Self::Paused | Self::Finished)
    }

    /// Returns true if out-of-band URLs are accepted in this state
    pub fn accepts_additional_urls(&self) -> bool {
        self.has_session()
    }

    pub fn is_crawling(&self) -> bool {
        matches!(self, Self::Crawling)
    }
}

impl fmt::Display for MapperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Crawling => "crawling",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
