//! Crawler coordinator - crawl session orchestration
//!
//! `PageMapper` is the controller consumers hold. It owns at most one crawl
//! session at a time; each session has:
//! - A `PageStore` with every URL it has discovered
//! - A runner task that owns the frontier and the in-flight fetches
//! - A notifier task that batches completed URLs into progress events
//!
//! Controller methods are synchronous and never block on the network; the
//! runner picks up state changes through a `watch` channel.

use crate::config::{validate, Config};
use crate::content::{classify_content, BaseContentType, ResponseType, ValidationArea};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::notifier::{run_notifier, CallbackSlot, ProgressCallback, ProgressEvent};
use crate::crawler::scheduler::{QueuedUrl, ScheduledFetch, Scheduler};
use crate::crawler::worker::{process_url, CompletedFetch};
use crate::state::MapperState;
use crate::storage::{
    require_html, DiscoveryPolicy, NetworkErrorKind, NetworkFailure, PageInfo, PageLookup,
    PageQuery, PageStore, RedirectInfo, StoreResult,
};
use crate::url::{normalize, MappableUrl};
use crate::{MapperError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use url::Url;

/// Progress events buffered per subscriber before the oldest are dropped
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The crawl controller
///
/// All methods take `&self`, so a `PageMapper` can be shared behind an `Arc`
/// and driven from several threads.
///
/// # Example
///
/// ```no_run
/// use page_mapper::{Config, MappableUrl, PageMapper, PageQuery, BaseContentType};
///
/// # async fn run() -> page_mapper::Result<()> {
/// let mapper = PageMapper::new(Config::default())?;
/// mapper.start(MappableUrl::parse("https://example.com/")?)?;
/// mapper.wait_until_settled().await;
///
/// for url in mapper.urls(BaseContentType::HtmlPage, None) {
///     println!("{}", url);
/// }
/// # Ok(())
/// # }
/// ```
pub struct PageMapper {
    config: Arc<Config>,
    client: Client,
    runtime: Handle,
    state: Arc<watch::Sender<MapperState>>,
    session: Mutex<Option<Session>>,
    callback: CallbackSlot,
}

/// Everything that belongs to one crawl
struct Session {
    scope: MappableUrl,
    store: Arc<PageStore>,
    commands: mpsc::UnboundedSender<QueuedUrl>,
    events: broadcast::Sender<ProgressEvent>,
    /// Set before the session's tasks are aborted; the runner checks it
    /// before changing controller state
    closed: Arc<AtomicBool>,
    runner: JoinHandle<()>,
    notifier: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.runner.abort();
        self.notifier.abort();
    }
}

impl PageMapper {
    /// Creates a controller in the `Idle` state
    ///
    /// Must be called from within a tokio runtime; fetches and the session
    /// runner are spawned onto it.
    ///
    /// # Returns
    ///
    /// * `Ok(PageMapper)` - Ready to start
    /// * `Err(MapperError::NoRuntime)` - Called outside a runtime
    /// * `Err(MapperError)` - Invalid configuration or HTTP client failure
    pub fn new(config: Config) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| MapperError::NoRuntime)?;
        validate(&config)?;

        let client = build_http_client(&config.crawler, &config.user_agent)?;
        let (state, _) = watch::channel(MapperState::Idle);

        Ok(Self {
            config: Arc::new(config),
            client,
            runtime,
            state: Arc::new(state),
            session: Mutex::new(None),
            callback: CallbackSlot::default(),
        })
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Lifecycle =====

    /// Starts crawling from `primary`
    ///
    /// Any previous session is discarded together with its results. Calling
    /// `start` while paused on the same primary URL resumes instead.
    pub fn start(&self, primary: MappableUrl) -> Result<()> {
        let mut session = self.lock_session();

        match self.state() {
            MapperState::Crawling => {
                return Err(MapperError::InvalidTransition {
                    from: MapperState::Crawling,
                    to: MapperState::Crawling,
                })
            }
            MapperState::Paused
                if session
                    .as_ref()
                    .map_or(false, |current| current.scope == primary) =>
            {
                tracing::info!("Resuming crawl of {}", primary.primary_url());
                self.state.send_replace(MapperState::Crawling);
                return Ok(());
            }
            _ => {}
        }

        self.replace_session(&mut session, primary);
        Ok(())
    }

    /// Stops dispatching new fetches; in-flight fetches finish and are recorded
    pub fn pause(&self) -> Result<()> {
        let _session = self.lock_session();
        self.transition(MapperState::Paused, |from| match from {
            MapperState::Crawling => Some(true),
            MapperState::Paused => Some(false),
            _ => None,
        })
    }

    /// Continues a paused crawl
    pub fn resume(&self) -> Result<()> {
        let _session = self.lock_session();
        self.transition(MapperState::Crawling, |from| match from {
            MapperState::Paused => Some(true),
            MapperState::Crawling | MapperState::Finished => Some(false),
            _ => None,
        })
    }

    /// Discards the current session
    ///
    /// In-flight fetches are aborted, the page store is dropped and progress
    /// subscribers see their channel close.
    pub fn cancel(&self) {
        let mut session = self.lock_session();
        if let Some(previous) = session.take() {
            tracing::info!("Cancelling crawl of {}", previous.scope.primary_url());
        }
        self.state.send_replace(MapperState::Cancelled);
    }

    /// Discards the current session and starts again from the same primary URL
    pub fn reload(&self) -> Result<()> {
        let mut session = self.lock_session();
        let primary = session
            .as_ref()
            .map(|current| current.scope.clone())
            .ok_or(MapperError::NoSession("reload"))?;

        self.replace_session(&mut session, primary);
        Ok(())
    }

    /// Queues a URL that was not reached through links
    ///
    /// Accepted while a session exists (crawling, paused or finished; a
    /// finished crawl resumes). Ignored without a session or when the URL is
    /// outside the crawl scope.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The URL was new and has been queued
    /// * `Ok(false)` - Ignored or already known
    /// * `Err(MapperError::UrlError)` - Not an HTTP(S) URL with a host
    pub fn add_additional_url(&self, url: &Url) -> Result<bool> {
        let session = self.lock_session();

        let current = match session.as_ref() {
            Some(current) if self.state().accepts_additional_urls() => current,
            _ => {
                tracing::debug!("No active session, ignoring {}", url);
                return Ok(false);
            }
        };

        let url = normalize(url)?;
        if !current.scope.contains(&url) {
            tracing::debug!("Ignoring out-of-scope URL {}", url);
            return Ok(false);
        }

        let expected = classify_content(None, url.path());
        if !current.store.record_discovered_as(&url, expected) {
            return Ok(false);
        }

        self.state.send_if_modified(|state| {
            if *state == MapperState::Finished {
                *state = MapperState::Crawling;
                true
            } else {
                false
            }
        });

        tracing::debug!("Queued additional URL {}", url);
        // The runner only goes away together with the session
        let _ = current.commands.send(QueuedUrl { url, expected });
        Ok(true)
    }

    fn replace_session(&self, slot: &mut Option<Session>, primary: MappableUrl) {
        // Dropping the old session aborts its tasks before the state changes
        drop(slot.take());

        tracing::info!("Starting crawl of {}", primary.primary_url());
        *slot = Some(self.spawn_session(primary));
        self.state.send_replace(MapperState::Crawling);
    }

    fn spawn_session(&self, scope: MappableUrl) -> Session {
        let crawler = &self.config.crawler;
        let store = Arc::new(PageStore::new(
            scope.clone(),
            DiscoveryPolicy::from_config(crawler),
        ));

        let primary = scope.primary_url().clone();
        let expected = classify_content(None, primary.path());
        store.record_discovered_as(&primary, expected);

        let scheduler = Scheduler::new(
            crawler.max_concurrent_fetches as usize,
            vec![QueuedUrl {
                url: primary,
                expected,
            }],
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        let notifier = self.runtime.spawn(run_notifier(
            completed_rx,
            crawler.progress_coalesce(),
            self.callback.clone(),
            events.clone(),
        ));

        let runner = SessionRunner {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            scope: scope.clone(),
            store: Arc::clone(&store),
            scheduler,
            commands: commands_rx,
            completed: completed_tx,
            state: Arc::clone(&self.state),
            closed: Arc::clone(&closed),
        };
        let runner = self.runtime.spawn(runner.run());

        Session {
            scope,
            store,
            commands: commands_tx,
            events,
            closed,
            runner,
            notifier,
        }
    }

    /// Applies a state change if `allowed` permits it from the current state
    ///
    /// `allowed` returns `Some(true)` to change, `Some(false)` for a no-op and
    /// `None` to reject.
    fn transition(
        &self,
        to: MapperState,
        allowed: impl Fn(MapperState) -> Option<bool>,
    ) -> Result<()> {
        let mut rejected = None;
        self.state.send_if_modified(|state| match allowed(*state) {
            Some(true) => {
                *state = to;
                true
            }
            Some(false) => false,
            None => {
                rejected = Some(*state);
                false
            }
        });

        match rejected {
            Some(from) => Err(MapperError::InvalidTransition { from, to }),
            None => Ok(()),
        }
    }

    // ===== Observation =====

    pub fn state(&self) -> MapperState {
        *self.state.borrow()
    }

    pub fn is_crawling(&self) -> bool {
        self.state().is_crawling()
    }

    /// A receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<MapperState> {
        self.state.subscribe()
    }

    /// Waits until the controller is no longer crawling
    ///
    /// Resolves immediately if it is not crawling now.
    pub async fn wait_until_settled(&self) -> MapperState {
        let mut state = self.state.subscribe();
        let settled = match state.wait_for(|current| *current != MapperState::Crawling).await {
            Ok(settled) => *settled,
            Err(_) => self.state(),
        };
        settled
    }

    /// Subscribes to progress events of the current session
    ///
    /// The channel closes when the session is cancelled or replaced. Without
    /// a session the returned receiver is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        match self.lock_session().as_ref() {
            Some(current) => current.events.subscribe(),
            None => {
                let (events, receiver) = broadcast::channel(1);
                drop(events);
                receiver
            }
        }
    }

    /// Installs a callback that receives every progress event
    ///
    /// Applies to the running session as well as later ones.
    pub fn set_progress_callback<F>(&self, callback: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let callback: ProgressCallback = Arc::new(callback);
        self.callback.set(Some(callback));
    }

    pub fn clear_progress_callback(&self) {
        self.callback.set(None);
    }

    /// The store of the current session
    pub fn page_store(&self) -> Option<Arc<PageStore>> {
        self.lock_session()
            .as_ref()
            .map(|current| Arc::clone(&current.store))
    }

    pub fn primary_url(&self) -> Option<Url> {
        self.lock_session()
            .as_ref()
            .map(|current| current.scope.primary_url().clone())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for PageMapper {
    fn drop(&mut self) {
        // Session's own Drop aborts its tasks
        drop(self.lock_session().take());
    }
}

/// Queries answer from the current session; without one every listing is empty
impl PageQuery for PageMapper {
    fn urls(&self, base: BaseContentType, response: Option<ResponseType>) -> Vec<Url> {
        self.page_store()
            .map(|store| store.urls(base, response))
            .unwrap_or_default()
    }

    fn urls_fully_validating(&self, base: BaseContentType) -> StoreResult<Vec<Url>> {
        match self.page_store() {
            Some(store) => store.urls_fully_validating(base),
            None => require_html(base).map(|_| Vec::new()),
        }
    }

    fn urls_failing_validation(
        &self,
        base: BaseContentType,
        area: ValidationArea,
    ) -> StoreResult<Vec<Url>> {
        match self.page_store() {
            Some(store) => store.urls_failing_validation(base, area),
            None => require_html(base).map(|_| Vec::new()),
        }
    }

    fn urls_linked_by(&self, url: &Url) -> Vec<Url> {
        self.page_store()
            .map(|store| store.urls_linked_by(url))
            .unwrap_or_default()
    }

    fn urls_linking_to(&self, url: &Url) -> Vec<Url> {
        self.page_store()
            .map(|store| store.urls_linking_to(url))
            .unwrap_or_default()
    }

    fn lookup(&self, url: &Url) -> PageLookup {
        self.page_store()
            .map_or(PageLookup::Unknown, |store| store.lookup(url))
    }

    fn redirect_info(&self, final_url: &Url) -> Option<RedirectInfo> {
        self.page_store()?.redirect_info(final_url)
    }

    fn count_loaded(&self, base: BaseContentType, response: Option<ResponseType>) -> usize {
        self.page_store()
            .map_or(0, |store| store.count_loaded(base, response))
    }

    fn count_requested(&self, base: BaseContentType) -> usize {
        self.page_store()
            .map_or(0, |store| store.count_requested(base))
    }
}

/// The task that drives one session
///
/// Owns the frontier and the fetch tasks. Only this task dispatches fetches
/// and records results; the controller only records discoveries.
struct SessionRunner {
    client: Client,
    config: Arc<Config>,
    scope: MappableUrl,
    store: Arc<PageStore>,
    scheduler: Scheduler,
    commands: mpsc::UnboundedReceiver<QueuedUrl>,
    completed: mpsc::UnboundedSender<Url>,
    state: Arc<watch::Sender<MapperState>>,
    closed: Arc<AtomicBool>,
}

impl SessionRunner {
    async fn run(mut self) {
        let mut state = self.state.subscribe();
        let mut tasks: JoinSet<CompletedFetch> = JoinSet::new();
        let mut in_flight: HashMap<Url, BaseContentType> = HashMap::new();

        loop {
            let current = *state.borrow_and_update();
            if current == MapperState::Crawling {
                self.dispatch(&mut tasks, &mut in_flight);
            }

            if tasks.is_empty() {
                self.fail_orphans(&mut in_flight);
                self.finish_if_drained();
            }

            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.handle_joined(joined, &mut in_flight);
                }
                command = self.commands.recv() => match command {
                    Some(queued) => self.scheduler.add_to_frontier(queued),
                    None => break,
                },
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::trace!("Session runner for {} stopped", self.scope.primary_url());
    }

    /// Starts as many fetches as the scheduler allows
    fn dispatch(
        &mut self,
        tasks: &mut JoinSet<CompletedFetch>,
        in_flight: &mut HashMap<Url, BaseContentType>,
    ) {
        while let Some(ScheduledFetch { url: queued, permit }) = self.scheduler.next_url() {
            if let Err(e) = self.store.mark_in_flight(&queued.url) {
                tracing::warn!("Skipping {}: {}", queued.url, e);
                continue;
            }

            in_flight.insert(queued.url.clone(), queued.expected);

            let client = self.client.clone();
            let config = Arc::clone(&self.config);
            let scope = self.scope.clone();
            tasks.spawn(async move {
                let _permit = permit;
                process_url(&client, &config.crawler, &scope, queued).await
            });
        }
    }

    fn handle_joined(
        &mut self,
        joined: std::result::Result<CompletedFetch, JoinError>,
        in_flight: &mut HashMap<Url, BaseContentType>,
    ) {
        match joined {
            Ok(done) => {
                in_flight.remove(&done.requested);
                self.record(done);
            }
            Err(e) if e.is_cancelled() => {
                tracing::trace!("Fetch task cancelled");
            }
            Err(e) => {
                tracing::warn!("Fetch task failed: {}", e);
            }
        }
    }

    fn record(&mut self, done: CompletedFetch) {
        let requested = done.requested;

        match self
            .store
            .record_completed(&requested, done.info, done.redirect)
        {
            Ok(discovered) => {
                for (url, expected) in discovered {
                    self.scheduler.add_to_frontier(QueuedUrl { url, expected });
                }
                // The notifier only goes away together with the session
                let _ = self.completed.send(requested);
            }
            Err(e) => {
                tracing::warn!("Dropping result for {}: {}", requested, e);
            }
        }
    }

    /// Completes URLs whose fetch task ended without returning a result
    fn fail_orphans(&mut self, in_flight: &mut HashMap<Url, BaseContentType>) {
        let orphans: Vec<(Url, BaseContentType)> = in_flight.drain().collect();

        for (url, expected) in orphans {
            let info = PageInfo::from_network_failure(
                url.clone(),
                expected,
                NetworkFailure {
                    kind: NetworkErrorKind::Other,
                    message: "fetch task ended without a result".to_string(),
                },
            );
            self.record(CompletedFetch {
                requested: url,
                info,
                redirect: None,
            });
        }
    }

    /// Moves the controller to `Finished` once nothing is pending
    fn finish_if_drained(&self) {
        if !self.scheduler.is_empty() {
            return;
        }

        let store = &self.store;
        let closed = &self.closed;
        let finished = self.state.send_if_modified(|state| {
            if *state == MapperState::Crawling
                && !closed.load(Ordering::SeqCst)
                && store.count_pending() == 0
            {
                *state = MapperState::Finished;
                true
            } else {
                false
            }
        });

        if finished {
            tracing::info!(
                "Crawl of {} finished: {} URL(s)",
                self.scope.primary_url(),
                store.len()
            );
        }
    }
}
