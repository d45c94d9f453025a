//! Scheduler for managing the crawl frontier and concurrency
//!
//! This module handles:
//! - FIFO queue management for URLs waiting to be fetched
//! - Global concurrency limiting via a semaphore

use crate::content::BaseContentType;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// The URL to fetch
    pub url: Url,

    /// The content type implied by the link it was discovered through
    pub expected: BaseContentType,
}

/// A scheduled fetch with a semaphore permit
///
/// The permit is released when the fetch task drops it, which frees the
/// slot for the next queued URL.
pub struct ScheduledFetch {
    /// The URL to fetch
    pub url: QueuedUrl,

    /// The semaphore permit for this fetch
    pub permit: OwnedSemaphorePermit,
}

/// Scheduler manages the frontier queue and the fetch concurrency limit
///
/// URLs are dispatched strictly in the order they were added.
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// Frontier queue of URLs to fetch
    frontier: VecDeque<QueuedUrl>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - Maximum number of fetches in flight at once
    /// * `initial_frontier` - Initial URLs to crawl
    pub fn new(max_concurrent: usize, initial_frontier: Vec<QueuedUrl>) -> Self {
        let max_concurrent = max_concurrent.max(1);

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            frontier: VecDeque::from(initial_frontier),
        }
    }

    /// Gets the next URL to fetch, if one is queued and a slot is free
    ///
    /// Never waits: the caller is expected to try again once a fetch
    /// completes or new URLs arrive.
    ///
    /// # Returns
    ///
    /// * `Some(ScheduledFetch)` - A URL that's ready to fetch
    /// * `None` - The frontier is empty or every slot is taken
    pub fn next_url(&mut self) -> Option<ScheduledFetch> {
        if self.frontier.is_empty() {
            return None;
        }

        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        let url = self.frontier.pop_front()?;

        tracing::trace!("Scheduling {} ({} still queued)", url.url, self.frontier.len());
        Some(ScheduledFetch { url, permit })
    }

    /// Adds a URL to the back of the frontier
    pub fn add_to_frontier(&mut self, url: QueuedUrl) {
        self.frontier.push_back(url);
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }
}
