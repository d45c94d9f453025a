//! Query traits and error types for the page store
//!
//! `PageQuery` is the read-only surface consumers use to list and inspect
//! crawl results. It is implemented by `PageStore` directly and by the
//! `PageMapper` controller, which forwards to its current session.

use crate::content::{BaseContentType, ResponseType, ValidationArea};
use crate::state::CrawlState;
use crate::storage::{PageInfo, RedirectInfo};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors that can occur during page store operations
///
/// All of these are contract violations by the caller; fetch failures are
/// recorded as data and never surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("URL was never discovered: {0}")]
    NotDiscovered(Url),

    #[error("URL already completed: {0}")]
    AlreadyCompleted(Url),
}

/// Result type for page store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// What the store knows about one URL
#[derive(Debug, Clone, PartialEq)]
pub enum PageLookup {
    /// Never discovered in this session
    Unknown,

    /// Discovered but not yet completed
    Pending(CrawlState),

    /// Fetched; the record will not change again
    Completed(Arc<PageInfo>),
}

impl PageLookup {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn page_info(&self) -> Option<&Arc<PageInfo>> {
        match self {
            Self::Completed(info) => Some(info),
            _ => None,
        }
    }
}

/// A link-graph predicate for `urls_filtered_by`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLinkFilter {
    /// URLs that the given page links to
    IsLinkedBy(Url),

    /// Pages that contain a link to the given URL
    ContainsLinkTo(Url),
}

/// Read-only queries over the results of a crawl session
///
/// Every method observes a consistent snapshot: a URL is either pending or
/// completed, never both and never neither once discovered.
pub trait PageQuery {
    // ===== Listings =====

    /// URLs of one base content type in discovery order
    ///
    /// With `response` set, only completed URLs in that response bucket are
    /// returned. Without it, pending URLs are included under the type they
    /// were expected to have when discovered.
    fn urls(&self, base: BaseContentType, response: Option<ResponseType>) -> Vec<Url>;

    /// Completed, successful URLs that pass every validation area
    ///
    /// Only meaningful for `BaseContentType::HtmlPage`; any other base type
    /// is rejected with `StoreError::InvalidQuery`.
    fn urls_fully_validating(&self, base: BaseContentType) -> StoreResult<Vec<Url>>;

    /// Completed URLs that fail the given validation area
    ///
    /// Only meaningful for `BaseContentType::HtmlPage`.
    fn urls_failing_validation(
        &self,
        base: BaseContentType,
        area: ValidationArea,
    ) -> StoreResult<Vec<Url>>;

    // ===== Link Graph =====

    /// Anchor targets of a completed page; empty if the page is not completed
    fn urls_linked_by(&self, url: &Url) -> Vec<Url>;

    /// Completed pages with an anchor pointing at `url`
    ///
    /// Empty if `url` itself has not completed.
    fn urls_linking_to(&self, url: &Url) -> Vec<Url>;

    fn urls_filtered_by(&self, filter: &PageLinkFilter) -> Vec<Url> {
        match filter {
            PageLinkFilter::IsLinkedBy(url) => self.urls_linked_by(url),
            PageLinkFilter::ContainsLinkTo(url) => self.urls_linking_to(url),
        }
    }

    // ===== Single URL =====

    fn lookup(&self, url: &Url) -> PageLookup;

    /// The completed record for a URL, or None while it is pending or unknown
    fn page_info(&self, url: &Url) -> Option<Arc<PageInfo>> {
        match self.lookup(url) {
            PageLookup::Completed(info) => Some(info),
            _ => None,
        }
    }

    fn crawl_state(&self, url: &Url) -> Option<CrawlState> {
        match self.lookup(url) {
            PageLookup::Unknown => None,
            PageLookup::Pending(state) => Some(state),
            PageLookup::Completed(_) => Some(CrawlState::Completed),
        }
    }

    fn has_finished_requesting(&self, url: &Url) -> bool {
        matches!(self.lookup(url), PageLookup::Completed(_))
    }

    /// How the given final URL was reached, if it was the end of a redirect chain
    fn redirect_info(&self, final_url: &Url) -> Option<RedirectInfo>;

    // ===== Counts =====

    /// Number of completed URLs of a base type, optionally in one response bucket
    fn count_loaded(&self, base: BaseContentType, response: Option<ResponseType>) -> usize;

    /// Number of discovered URLs of a base type, pending or completed
    fn count_requested(&self, base: BaseContentType) -> usize {
        self.urls(base, None).len()
    }
}

/// Rejects validation queries for anything but HTML pages
pub(crate) fn require_html(base: BaseContentType) -> StoreResult<()> {
    if base == BaseContentType::HtmlPage {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!(
            "validation applies to HTML pages only, not {}",
            base
        )))
    }
}
