//! Progress notification
//!
//! Completed URLs arrive one at a time from the session runner and are
//! batched into `ProgressEvent`s so that a fast crawl does not flood
//! consumers. Each completed URL appears in exactly one event.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use url::Url;

/// A batch of URLs whose records became available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Newly completed URLs, in completion order
    pub urls: Vec<Url>,
}

/// Callback invoked for every progress event
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// The controller's callback slot, shared with every session's notifier
#[derive(Clone, Default)]
pub(crate) struct CallbackSlot(Arc<RwLock<Option<ProgressCallback>>>);

impl CallbackSlot {
    pub(crate) fn set(&self, callback: Option<ProgressCallback>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn get(&self) -> Option<ProgressCallback> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = self.get().is_some();
        f.debug_struct("CallbackSlot").field("set", &set).finish()
    }
}

/// Batches completed URLs and delivers them to the callback and subscribers
///
/// A batch opens with the first URL after a quiet period and closes once
/// `window` has elapsed. Runs until the sending side is dropped; any batch
/// still open at that point is delivered first.
pub(crate) async fn run_notifier(
    mut completed: mpsc::UnboundedReceiver<Url>,
    window: Duration,
    callback: CallbackSlot,
    events: broadcast::Sender<ProgressEvent>,
) {
    while let Some(first) = completed.recv().await {
        let mut urls = vec![first];
        let deadline = Instant::now() + window;
        let mut open = true;

        loop {
            tokio::select! {
                next = completed.recv() => match next {
                    Some(url) => urls.push(url),
                    None => {
                        open = false;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        deliver(ProgressEvent { urls }, &callback, &events);

        if !open {
            break;
        }
    }

    tracing::trace!("Progress notifier stopped");
}

fn deliver(
    event: ProgressEvent,
    callback: &CallbackSlot,
    events: &broadcast::Sender<ProgressEvent>,
) {
    tracing::trace!("Progress: {} URL(s) completed", event.urls.len());

    if let Some(callback) = callback.get() {
        callback(&event);
    }

    // No subscribers is fine
    let _ = events.send(event);
}
