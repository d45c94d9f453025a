//! In-memory page store
//!
//! This module provides the authoritative mapping from requested URL to its
//! crawl state and result record for one session, along with the link graph
//! and the redirect chains observed while fetching.

use crate::config::CrawlerConfig;
use crate::content::{
    classify_content, completely_validates, validates, BaseContentType, ResponseType,
    ValidationArea,
};
use crate::state::CrawlState;
use crate::storage::traits::{require_html, PageLookup, PageQuery, StoreError, StoreResult};
use crate::storage::{LinkKind, PageInfo, RedirectInfo};
use crate::url::{normalize, MappableUrl};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;

/// Which kinds of in-scope links are queued for fetching
///
/// Anchors are always followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    pub crawl_images: bool,
    pub crawl_feeds: bool,
}

impl DiscoveryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            crawl_images: config.crawl_images,
            crawl_feeds: config.crawl_feeds,
        }
    }

    pub fn admits(&self, kind: LinkKind) -> bool {
        match kind {
            LinkKind::Anchor => true,
            LinkKind::Image => self.crawl_images,
            LinkKind::Feed => self.crawl_feeds,
        }
    }
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            crawl_images: true,
            crawl_feeds: true,
        }
    }
}

/// One discovered URL
#[derive(Debug)]
struct PageEntry {
    /// The type implied by how the URL was discovered
    expected: BaseContentType,
    state: CrawlState,
    info: Option<Arc<PageInfo>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Discovery order
    order: Vec<Url>,
    entries: HashMap<Url, PageEntry>,
    /// Keyed by final URL
    redirects: HashMap<Url, RedirectInfo>,
    links_from: HashMap<Url, Vec<Url>>,
    links_to: HashMap<Url, Vec<Url>>,
}

impl StoreInner {
    fn discover(&mut self, key: Url, expected: BaseContentType) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }

        tracing::trace!("Discovered {} as {:?}", key, expected);
        self.entries.insert(
            key.clone(),
            PageEntry {
                expected,
                state: CrawlState::Queued,
                info: None,
            },
        );
        self.order.push(key);
        true
    }

    fn completed(&self) -> impl Iterator<Item = (&Url, &Arc<PageInfo>)> + '_ {
        self.order.iter().filter_map(move |url| {
            self.entries
                .get(url)
                .and_then(|entry| entry.info.as_ref())
                .map(|info| (url, info))
        })
    }

    fn is_completed(&self, key: &Url) -> bool {
        self.entries
            .get(key)
            .map_or(false, |entry| entry.state.is_completed())
    }
}

/// Thread-safe store for one crawl session
///
/// All state sits behind a single `RwLock`; every operation holds it for a
/// short critical section, so readers always observe a URL as exactly one of
/// pending or completed.
#[derive(Debug)]
pub struct PageStore {
    scope: MappableUrl,
    policy: DiscoveryPolicy,
    inner: RwLock<StoreInner>,
}

impl PageStore {
    pub fn new(scope: MappableUrl, policy: DiscoveryPolicy) -> Self {
        Self {
            scope,
            policy,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn scope(&self) -> &MappableUrl {
        &self.scope
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Recording =====

    /// Queues a URL, inferring its expected type from the path
    ///
    /// Returns true if the URL was new. Out-of-scope and non-HTTP URLs are
    /// never recorded.
    pub fn record_discovered(&self, url: &Url) -> bool {
        self.record_discovered_as(url, classify_content(None, url.path()))
    }

    /// Queues a URL with an explicit expected content type
    pub fn record_discovered_as(&self, url: &Url, expected: BaseContentType) -> bool {
        let Some(key) = store_key(url) else {
            return false;
        };
        if !self.scope.contains(&key) {
            return false;
        }

        self.write().discover(key, expected)
    }

    /// Moves a queued URL to in-flight
    pub fn mark_in_flight(&self, url: &Url) -> StoreResult<()> {
        let key = store_key(url).ok_or_else(|| StoreError::NotDiscovered(url.clone()))?;
        let mut inner = self.write();

        let entry = inner
            .entries
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotDiscovered(key.clone()))?;

        match entry.state {
            CrawlState::InFlight => Ok(()),
            state if state.can_transition_to(CrawlState::InFlight) => {
                entry.state = CrawlState::InFlight;
                Ok(())
            }
            _ => Err(StoreError::AlreadyCompleted(key)),
        }
    }

    /// Records the result of fetching `requested`
    ///
    /// The transition to completed happens exactly once. In the same
    /// critical section the redirect chain is stored under its final URL,
    /// the page's anchors are added to the link graph, and every admitted
    /// in-scope link is queued.
    ///
    /// # Returns
    ///
    /// The URLs that were newly queued, with their expected content type
    pub fn record_completed(
        &self,
        requested: &Url,
        info: PageInfo,
        redirect: Option<RedirectInfo>,
    ) -> StoreResult<Vec<(Url, BaseContentType)>> {
        let key =
            store_key(requested).ok_or_else(|| StoreError::NotDiscovered(requested.clone()))?;

        let anchors = info.anchor_targets();
        let candidates: Vec<(Url, BaseContentType)> = info
            .links()
            .iter()
            .filter(|link| self.policy.admits(link.kind))
            .filter(|link| self.scope.contains(&link.url))
            .filter_map(|link| {
                store_key(&link.url).map(|url| (url, link.kind.expected_content_type()))
            })
            .collect();

        let mut inner = self.write();

        let entry = inner
            .entries
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotDiscovered(key.clone()))?;
        if !entry.state.can_transition_to(CrawlState::Completed) {
            return Err(StoreError::AlreadyCompleted(key));
        }
        entry.state = CrawlState::Completed;
        entry.info = Some(Arc::new(info));

        if let Some(redirect) = redirect {
            if let Some(final_key) = store_key(&redirect.final_url) {
                inner.redirects.insert(final_key, redirect);
            }
        }

        for target in &anchors {
            let sources = inner.links_to.entry(target.clone()).or_default();
            if !sources.contains(&key) {
                sources.push(key.clone());
            }
        }
        inner.links_from.insert(key.clone(), anchors);

        let mut discovered = Vec::new();
        for (url, expected) in candidates {
            if inner.discover(url.clone(), expected) {
                discovered.push((url, expected));
            }
        }

        tracing::debug!(
            "Completed {} ({} new URL(s) queued)",
            key,
            discovered.len()
        );

        Ok(discovered)
    }

    // ===== Inspection =====

    /// Number of discovered URLs
    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of URLs still queued or in flight
    pub fn count_pending(&self) -> usize {
        self.read()
            .entries
            .values()
            .filter(|entry| entry.state.is_pending())
            .count()
    }
}

impl PageQuery for PageStore {
    fn urls(&self, base: BaseContentType, response: Option<ResponseType>) -> Vec<Url> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter(|url| match inner.entries.get(*url) {
                Some(PageEntry {
                    info: Some(info), ..
                }) => {
                    info.base_content_type == base
                        && response.map_or(true, |r| info.response_type() == r)
                }
                Some(entry) => response.is_none() && entry.expected == base,
                None => false,
            })
            .cloned()
            .collect()
    }

    fn urls_fully_validating(&self, base: BaseContentType) -> StoreResult<Vec<Url>> {
        require_html(base)?;
        let inner = self.read();
        Ok(inner
            .completed()
            .filter(|(_, info)| is_validatable(info) && completely_validates(info))
            .map(|(url, _)| url.clone())
            .collect())
    }

    fn urls_failing_validation(
        &self,
        base: BaseContentType,
        area: ValidationArea,
    ) -> StoreResult<Vec<Url>> {
        require_html(base)?;
        let inner = self.read();
        Ok(inner
            .completed()
            .filter(|(_, info)| is_validatable(info) && !validates(info, area))
            .map(|(url, _)| url.clone())
            .collect())
    }

    fn urls_linked_by(&self, url: &Url) -> Vec<Url> {
        let Some(key) = store_key(url) else {
            return Vec::new();
        };
        let inner = self.read();
        if !inner.is_completed(&key) {
            return Vec::new();
        }
        inner.links_from.get(&key).cloned().unwrap_or_default()
    }

    fn urls_linking_to(&self, url: &Url) -> Vec<Url> {
        let Some(key) = store_key(url) else {
            return Vec::new();
        };
        let inner = self.read();
        if !inner.is_completed(&key) {
            return Vec::new();
        }
        inner.links_to.get(&key).cloned().unwrap_or_default()
    }

    fn lookup(&self, url: &Url) -> PageLookup {
        let Some(key) = store_key(url) else {
            return PageLookup::Unknown;
        };
        let inner = self.read();
        match inner.entries.get(&key) {
            None => PageLookup::Unknown,
            Some(PageEntry {
                info: Some(info), ..
            }) => PageLookup::Completed(Arc::clone(info)),
            Some(entry) => PageLookup::Pending(entry.state),
        }
    }

    fn redirect_info(&self, final_url: &Url) -> Option<RedirectInfo> {
        let key = store_key(final_url)?;
        self.read().redirects.get(&key).cloned()
    }

    fn count_loaded(&self, base: BaseContentType, response: Option<ResponseType>) -> usize {
        self.read()
            .completed()
            .filter(|(_, info)| {
                info.base_content_type == base
                    && response.map_or(true, |r| info.response_type() == r)
            })
            .count()
    }
}

fn store_key(url: &Url) -> Option<Url> {
    normalize(url).ok()
}

/// Validation is judged only for HTML pages that loaded successfully
fn is_validatable(info: &PageInfo) -> bool {
    info.base_content_type == BaseContentType::HtmlPage
        && info.response_type() == ResponseType::Successful
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HtmlContent, NetworkErrorKind, NetworkFailure, PageLink, RedirectHop};
    use chrono::Utc;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn store() -> PageStore {
        PageStore::new(
            MappableUrl::parse("http://example.com/").unwrap(),
            DiscoveryPolicy::default(),
        )
    }

    fn html_page(requested: &str, links: Vec<(&str, LinkKind, bool)>) -> PageInfo {
        let requested = url(requested);
        PageInfo {
            requested_url: requested.clone(),
            final_url: Some(requested),
            status_code: Some(200),
            network_failure: None,
            base_content_type: BaseContentType::HtmlPage,
            mime_type: Some("text/html".to_string()),
            byte_count: 512,
            html: Some(HtmlContent {
                titles: vec!["Title".to_string()],
                h1_headings: vec!["Heading".to_string()],
                meta_description: Some("Description".to_string()),
                links: links
                    .into_iter()
                    .map(|(target, kind, in_scope)| PageLink {
                        url: url(target),
                        kind,
                        in_scope,
                    })
                    .collect(),
                ..HtmlContent::default()
            }),
            fetched_at: Utc::now(),
        }
    }

    fn image(requested: &str) -> PageInfo {
        let requested = url(requested);
        PageInfo {
            requested_url: requested.clone(),
            final_url: Some(requested),
            status_code: Some(200),
            network_failure: None,
            base_content_type: BaseContentType::Image,
            mime_type: Some("image/png".to_string()),
            byte_count: 64,
            html: None,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let store = store();
        assert!(store.record_discovered(&url("http://example.com/a")));
        assert!(!store.record_discovered(&url("http://example.com/a/")));
        assert!(!store.record_discovered(&url("http://example.com/a#top")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_out_of_scope_not_recorded() {
        let store = store();
        assert!(!store.record_discovered(&url("http://other.com/")));
        assert!(!store.record_discovered(&url("ftp://example.com/file")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_pending_then_completed() {
        let store = store();
        let a = url("http://example.com/");
        store.record_discovered(&a);

        assert_eq!(store.lookup(&a), PageLookup::Pending(CrawlState::Queued));
        assert!(store.page_info(&a).is_none());

        store.mark_in_flight(&a).unwrap();
        assert_eq!(store.crawl_state(&a), Some(CrawlState::InFlight));

        store
            .record_completed(&a, html_page("http://example.com/", vec![]), None)
            .unwrap();
        assert!(store.has_finished_requesting(&a));
        assert!(store.page_info(&a).is_some());
        assert_eq!(store.count_pending(), 0);
    }

    #[test]
    fn test_contract_violations() {
        let store = store();
        let a = url("http://example.com/");

        assert_eq!(
            store.mark_in_flight(&a),
            Err(StoreError::NotDiscovered(a.clone()))
        );
        assert!(matches!(
            store.record_completed(&a, html_page("http://example.com/", vec![]), None),
            Err(StoreError::NotDiscovered(_))
        ));

        store.record_discovered(&a);
        store
            .record_completed(&a, html_page("http://example.com/", vec![]), None)
            .unwrap();
        assert_eq!(
            store.record_completed(&a, html_page("http://example.com/", vec![]), None),
            Err(StoreError::AlreadyCompleted(a.clone()))
        );
        assert_eq!(
            store.mark_in_flight(&a),
            Err(StoreError::AlreadyCompleted(a))
        );
    }

    #[test]
    fn test_completion_queues_in_scope_links() {
        let store = store();
        let home = url("http://example.com/");
        store.record_discovered(&home);

        let page = html_page(
            "http://example.com/",
            vec![
                ("http://example.com/about", LinkKind::Anchor, true),
                ("http://cdn.example.net/logo.png", LinkKind::Image, false),
                ("http://example.com/logo.png", LinkKind::Image, true),
                ("http://example.com/feed.xml", LinkKind::Feed, true),
                ("http://example.com/about", LinkKind::Anchor, true),
            ],
        );
        let discovered = store.record_completed(&home, page, None).unwrap();

        assert_eq!(
            discovered,
            vec![
                (url("http://example.com/about"), BaseContentType::HtmlPage),
                (url("http://example.com/logo.png"), BaseContentType::Image),
                (url("http://example.com/feed.xml"), BaseContentType::Feed),
            ]
        );
        assert_eq!(
            store.urls(BaseContentType::HtmlPage, None),
            vec![home, url("http://example.com/about")]
        );
        assert_eq!(
            store.urls(BaseContentType::Image, None),
            vec![url("http://example.com/logo.png")]
        );
    }

    #[test]
    fn test_policy_skips_images_and_feeds() {
        let store = PageStore::new(
            MappableUrl::parse("http://example.com/").unwrap(),
            DiscoveryPolicy {
                crawl_images: false,
                crawl_feeds: false,
            },
        );
        let home = url("http://example.com/");
        store.record_discovered(&home);

        let page = html_page(
            "http://example.com/",
            vec![
                ("http://example.com/logo.png", LinkKind::Image, true),
                ("http://example.com/feed.xml", LinkKind::Feed, true),
            ],
        );
        assert!(store.record_completed(&home, page, None).unwrap().is_empty());
    }

    #[test]
    fn test_response_filter_excludes_pending() {
        let store = store();
        let home = url("http://example.com/");
        store.record_discovered(&home);
        store.record_discovered(&url("http://example.com/pending"));
        store
            .record_completed(&home, html_page("http://example.com/", vec![]), None)
            .unwrap();

        assert_eq!(
            store.urls(BaseContentType::HtmlPage, Some(ResponseType::Successful)),
            vec![home]
        );
        assert_eq!(store.count_requested(BaseContentType::HtmlPage), 2);
        assert_eq!(store.count_loaded(BaseContentType::HtmlPage, None), 1);
    }

    #[test]
    fn test_actual_type_replaces_expected_type() {
        let store = store();
        let logo = url("http://example.com/logo");
        store.record_discovered(&logo);
        assert_eq!(store.urls(BaseContentType::HtmlPage, None), vec![logo.clone()]);

        store
            .record_completed(&logo, image("http://example.com/logo"), None)
            .unwrap();
        assert!(store.urls(BaseContentType::HtmlPage, None).is_empty());
        assert_eq!(store.urls(BaseContentType::Image, None), vec![logo]);
    }

    #[test]
    fn test_validation_queries() {
        let store = store();
        let good = url("http://example.com/good");
        let bad = url("http://example.com/bad");
        store.record_discovered(&good);
        store.record_discovered(&bad);

        store
            .record_completed(&good, html_page("http://example.com/good", vec![]), None)
            .unwrap();
        let mut bad_page = html_page("http://example.com/bad", vec![]);
        if let Some(html) = bad_page.html.as_mut() {
            html.titles.push("Second".to_string());
        }
        store.record_completed(&bad, bad_page, None).unwrap();

        assert_eq!(
            store
                .urls_fully_validating(BaseContentType::HtmlPage)
                .unwrap(),
            vec![good]
        );
        assert_eq!(
            store
                .urls_failing_validation(BaseContentType::HtmlPage, ValidationArea::Title)
                .unwrap(),
            vec![bad]
        );
        assert!(matches!(
            store.urls_fully_validating(BaseContentType::Image),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_error_pages_never_fully_validate() {
        let store = store();
        let missing = url("http://example.com/missing");
        store.record_discovered(&missing);

        let mut page = html_page("http://example.com/missing", vec![]);
        page.status_code = Some(404);
        store.record_completed(&missing, page, None).unwrap();

        assert!(store
            .urls_fully_validating(BaseContentType::HtmlPage)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_network_failure_listed_under_expected_type() {
        let store = store();
        let down = url("http://example.com/down");
        store.record_discovered(&down);

        let info = PageInfo::from_network_failure(
            down.clone(),
            BaseContentType::HtmlPage,
            NetworkFailure {
                kind: NetworkErrorKind::Timeout,
                message: "timed out".to_string(),
            },
        );
        store.record_completed(&down, info, None).unwrap();

        assert_eq!(
            store.urls(BaseContentType::HtmlPage, Some(ResponseType::NetworkError)),
            vec![down]
        );
    }

    #[test]
    fn test_link_graph_symmetry() {
        let store = store();
        let home = url("http://example.com/");
        let about = url("http://example.com/about");
        store.record_discovered(&home);

        let discovered = store
            .record_completed(
                &home,
                html_page(
                    "http://example.com/",
                    vec![("http://example.com/about", LinkKind::Anchor, true)],
                ),
                None,
            )
            .unwrap();
        assert_eq!(discovered.len(), 1);

        // Not completed yet
        assert!(store.urls_linking_to(&about).is_empty());

        store
            .record_completed(
                &about,
                html_page(
                    "http://example.com/about",
                    vec![("http://example.com/", LinkKind::Anchor, true)],
                ),
                None,
            )
            .unwrap();

        assert_eq!(store.urls_linked_by(&home), vec![about.clone()]);
        assert_eq!(store.urls_linking_to(&about), vec![home.clone()]);
        assert_eq!(store.urls_linked_by(&about), vec![home.clone()]);
        assert_eq!(store.urls_linking_to(&home), vec![about]);
    }

    #[test]
    fn test_redirect_stored_under_final_url() {
        let store = store();
        let old = url("http://example.com/old");
        let new = url("http://example.com/new");
        store.record_discovered(&old);

        let mut page = html_page("http://example.com/old", vec![]);
        page.final_url = Some(new.clone());
        let redirect = RedirectInfo {
            requested_url: old.clone(),
            final_url: new.clone(),
            hops: vec![RedirectHop {
                from: old.clone(),
                to: new.clone(),
                status_code: 301,
            }],
        };
        store.record_completed(&old, page, Some(redirect)).unwrap();

        let info = store.redirect_info(&new).unwrap();
        assert_eq!(info.requested_url, old);
        assert_eq!(info.status_code(), Some(301));
        assert_eq!(store.lookup(&new), PageLookup::Unknown);
        assert_eq!(store.len(), 1);
    }
}
