//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive a
//! `PageMapper` through full crawl sessions end-to-end.

use page_mapper::config::{Config, CrawlerConfig};
use page_mapper::storage::NetworkErrorKind;
use page_mapper::{
    normalize_url, BaseContentType, CrawlState, MappableUrl, MapperError, MapperState, PageLookup,
    PageMapper, PageQuery, ResponseType, ValidationArea,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with a short progress window
fn create_test_config(max_concurrent_fetches: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_fetches,
            request_timeout_secs: Some(5),
            progress_coalesce_ms: 10,
            ..CrawlerConfig::default()
        },
        ..Config::default()
    }
}

/// Mounts an HTML page at `route`
async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(html.as_bytes().to_vec(), "text/html"),
        )
        .mount(server)
        .await;
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title>
        <meta name="description" content="About {title}"></head>
        <body><h1>{title}</h1>{body}</body></html>"#
    )
}

fn url_for(server: &MockServer, route: &str) -> Url {
    normalize_url(&format!("{}{}", server.uri(), route)).expect("Failed to build URL")
}

fn start_mapper(config: Config, server: &MockServer) -> PageMapper {
    let mapper = PageMapper::new(config).expect("Failed to create mapper");
    let primary = MappableUrl::parse(&format!("{}/", server.uri())).expect("Invalid primary URL");
    mapper.start(primary).expect("Failed to start crawl");
    mapper
}

async fn settle(mapper: &PageMapper) -> MapperState {
    tokio::time::timeout(Duration::from_secs(10), mapper.wait_until_settled())
        .await
        .expect("Crawl did not settle in time")
}

/// Polls until `url` reaches `expected`
async fn wait_for_crawl_state(mapper: &PageMapper, url: &Url, expected: CrawlState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while mapper.crawl_state(url) != Some(expected) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} never reached {}", url, expected));
}

/// Mounts a home page whose response is held back long enough to pause mid-fetch
async fn mount_slow_home(server: &MockServer, links: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(page("Home", links), "text/html")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        &page(
            "Home",
            r#"<a href="/page1">Page 1</a>
            <a href="/page2/">Page 2</a>
            <a href="https://elsewhere.example.org/">Elsewhere</a>
            <img src="/logo.png">"#,
        ),
    )
    .await;
    mount_page(&mock_server, "/page1", &page("Page 1", r#"<a href="/">Home</a>"#)).await;
    mount_page(&mock_server, "/page2", &page("Page 2", "Content 2")).await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
        )
        .mount(&mock_server)
        .await;

    let mapper = start_mapper(create_test_config(4), &mock_server);
    assert_eq!(settle(&mapper).await, MapperState::Finished);

    let pages = mapper.urls(BaseContentType::HtmlPage, Some(ResponseType::Successful));
    assert_eq!(pages.len(), 3, "Expected 3 pages, got {:?}", pages);
    assert!(pages.contains(&url_for(&mock_server, "/page2")));

    assert_eq!(mapper.count_loaded(BaseContentType::Image, None), 1);
    assert_eq!(
        mapper.urls(BaseContentType::Image, None),
        vec![url_for(&mock_server, "/logo.png")]
    );

    // The external link is counted but never fetched
    let home = mapper
        .page_info(&url_for(&mock_server, "/"))
        .expect("Home page should be completed");
    let html = home.html.as_ref().expect("Home page should be parsed");
    assert_eq!(html.internal_link_count, 2);
    assert_eq!(html.external_link_count, 1);
    assert_eq!(
        mapper.lookup(&Url::parse("https://elsewhere.example.org/").unwrap()),
        PageLookup::Unknown
    );

    assert_eq!(
        mapper
            .urls_fully_validating(BaseContentType::HtmlPage)
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_redirect_tracking() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", &page("Home", r#"<a href="/old">Old</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/new", &page("New", "Moved here")).await;

    let mapper = start_mapper(create_test_config(2), &mock_server);
    assert_eq!(settle(&mapper).await, MapperState::Finished);

    let old = url_for(&mock_server, "/old");
    let new = url_for(&mock_server, "/new");

    // The record lives under the URL that was requested
    let info = mapper.page_info(&old).expect("Redirected URL should be completed");
    assert_eq!(info.status_code, Some(200));
    assert_eq!(info.final_url.as_ref(), Some(&new));
    assert!(info.was_redirected());

    // The chain is found under the URL it ended at
    let redirect = mapper.redirect_info(&new).expect("Redirect should be recorded");
    assert_eq!(redirect.requested_url, old);
    assert_eq!(redirect.status_code(), Some(301));
    assert!(mapper.redirect_info(&old).is_none());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let mock_server = MockServer::start().await;

    mount_slow_home(&mock_server, r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#)
        .await;
    for route in ["/a", "/b", "/c"] {
        mount_page(&mock_server, route, &page(route, "")).await;
    }

    let home = url_for(&mock_server, "/");
    let a = url_for(&mock_server, "/a");

    let mapper = start_mapper(create_test_config(1), &mock_server);
    wait_for_crawl_state(&mapper, &home, CrawlState::InFlight).await;

    mapper.pause().expect("Failed to pause");
    assert_eq!(mapper.state(), MapperState::Paused);

    // The fetch that was already running completes and is recorded
    wait_for_crawl_state(&mapper, &home, CrawlState::Completed).await;
    assert_eq!(mapper.crawl_state(&a), Some(CrawlState::Queued));

    // Nothing new is dispatched while paused
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mapper.state(), MapperState::Paused);
    assert_eq!(mapper.crawl_state(&a), Some(CrawlState::Queued));
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 1);

    mapper.resume().expect("Failed to resume");
    assert_eq!(settle(&mapper).await, MapperState::Finished);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 4);

    // Resuming a finished crawl is a no-op
    mapper.resume().expect("Resume after finish should be accepted");
    assert_eq!(mapper.state(), MapperState::Finished);
}

#[tokio::test]
async fn test_start_while_paused_resumes() {
    let mock_server = MockServer::start().await;

    mount_slow_home(&mock_server, r#"<a href="/a">A</a>"#).await;
    mount_page(&mock_server, "/a", &page("A", "")).await;

    let home = url_for(&mock_server, "/");
    let a = url_for(&mock_server, "/a");

    let mapper = start_mapper(create_test_config(1), &mock_server);
    wait_for_crawl_state(&mapper, &home, CrawlState::InFlight).await;
    mapper.pause().expect("Failed to pause");
    wait_for_crawl_state(&mapper, &home, CrawlState::Completed).await;

    let primary = MappableUrl::parse(&format!("{}/", mock_server.uri())).unwrap();
    mapper.start(primary).expect("Start on the paused primary should resume");
    assert_eq!(mapper.state(), MapperState::Crawling);

    // The existing results are kept rather than starting over
    assert_eq!(mapper.crawl_state(&home), Some(CrawlState::Completed));
    assert_eq!(mapper.crawl_state(&a), Some(CrawlState::Queued));

    assert_eq!(settle(&mapper).await, MapperState::Finished);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 2);

    let home_requests = mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == "/")
        .count();
    assert_eq!(home_requests, 1);
}

#[tokio::test]
async fn test_start_while_crawling_rejected() {
    let mock_server = MockServer::start().await;
    mount_slow_home(&mock_server, "").await;

    let mapper = start_mapper(create_test_config(1), &mock_server);
    let primary = MappableUrl::parse(&format!("{}/", mock_server.uri())).unwrap();

    let result = mapper.start(primary);
    assert!(matches!(
        result,
        Err(MapperError::InvalidTransition {
            from: MapperState::Crawling,
            to: MapperState::Crawling,
        })
    ));

    // The running session is unaffected
    assert_eq!(settle(&mapper).await, MapperState::Finished);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 1);
}

#[tokio::test]
async fn test_reload_restarts_session() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", &page("Home", r#"<a href="/a">A</a>"#)).await;
    mount_page(&mock_server, "/a", &page("A", "")).await;

    let home = url_for(&mock_server, "/");
    let a = url_for(&mock_server, "/a");

    let mapper = start_mapper(create_test_config(2), &mock_server);
    assert_eq!(settle(&mapper).await, MapperState::Finished);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 2);

    mapper.reload().expect("Failed to reload");
    assert_eq!(mapper.state(), MapperState::Crawling);
    assert_eq!(mapper.primary_url(), Some(home.clone()));

    // The previous results are gone; only the primary URL is known again
    assert_eq!(mapper.crawl_state(&home), Some(CrawlState::Queued));
    assert_eq!(mapper.lookup(&a), PageLookup::Unknown);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 0);

    assert_eq!(settle(&mapper).await, MapperState::Finished);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 2);

    let home_requests = mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == "/")
        .count();
    assert_eq!(home_requests, 2);
}

#[tokio::test]
async fn test_validation_failures() {
    let mock_server = MockServer::start().await;

    // An inline SVG label is not a second document title
    mount_page(
        &mock_server,
        "/",
        &page(
            "Home",
            r#"<a href="/dupes">Dupes</a><a href="/bare">Bare</a>
            <svg role="img"><title>Search icon</title><path d="M0 0"/></svg>"#,
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/dupes",
        r#"<html><head><title>One</title><title>Two</title>
        <meta name="description" content="Two titles"></head>
        <body><h1>Dupes</h1></body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/bare",
        "<html><head><title>Bare</title></head><body><p>No heading</p></body></html>",
    )
    .await;

    let mapper = start_mapper(create_test_config(2), &mock_server);
    settle(&mapper).await;

    let bad_titles = mapper
        .urls_failing_validation(BaseContentType::HtmlPage, ValidationArea::Title)
        .unwrap();
    assert_eq!(bad_titles, vec![url_for(&mock_server, "/dupes")]);

    let bad_headings = mapper
        .urls_failing_validation(BaseContentType::HtmlPage, ValidationArea::Heading)
        .unwrap();
    assert_eq!(bad_headings, vec![url_for(&mock_server, "/bare")]);

    let valid = mapper
        .urls_fully_validating(BaseContentType::HtmlPage)
        .unwrap();
    assert_eq!(valid, vec![url_for(&mock_server, "/")]);

    // Only HTML pages are judged
    assert!(mapper
        .urls_fully_validating(BaseContentType::Image)
        .is_err());
}

#[tokio::test]
async fn test_cancel_discards_results() {
    let first = MockServer::start().await;
    mount_page(&first, "/", &page("First", r#"<a href="/only-first">x</a>"#)).await;
    mount_page(&first, "/only-first", &page("Only first", "")).await;

    let mapper = start_mapper(create_test_config(2), &first);
    settle(&mapper).await;
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 2);

    mapper.cancel();
    assert_eq!(mapper.state(), MapperState::Cancelled);
    assert!(mapper.urls(BaseContentType::HtmlPage, None).is_empty());
    assert_eq!(
        mapper.lookup(&url_for(&first, "/only-first")),
        PageLookup::Unknown
    );
    assert!(mapper.primary_url().is_none());

    let second = MockServer::start().await;
    mount_page(&second, "/", &page("Second", "")).await;

    let primary = MappableUrl::parse(&format!("{}/", second.uri())).unwrap();
    mapper.start(primary).expect("Failed to restart");
    assert_eq!(settle(&mapper).await, MapperState::Finished);

    assert_eq!(
        mapper.urls(BaseContentType::HtmlPage, None),
        vec![url_for(&second, "/")]
    );
    assert_eq!(
        mapper.lookup(&url_for(&first, "/only-first")),
        PageLookup::Unknown
    );
}

#[tokio::test]
async fn test_error_buckets() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        &page(
            "Home",
            r#"<a href="/missing">Missing</a><a href="/broken">Broken</a><a href="/slow">Slow</a>"#,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(page("Slow", ""), "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(4);
    config.crawler.request_timeout_secs = Some(1);

    let mapper = start_mapper(config, &mock_server);
    settle(&mapper).await;

    let missing = url_for(&mock_server, "/missing");
    let broken = url_for(&mock_server, "/broken");
    let slow = url_for(&mock_server, "/slow");

    assert_eq!(
        mapper.urls(BaseContentType::HtmlPage, Some(ResponseType::RequestErrors)),
        vec![missing]
    );
    assert_eq!(
        mapper.urls(BaseContentType::HtmlPage, Some(ResponseType::ResponseErrors)),
        vec![broken]
    );
    assert_eq!(
        mapper.urls(BaseContentType::HtmlPage, Some(ResponseType::NetworkError)),
        vec![slow.clone()]
    );

    let info = mapper.page_info(&slow).expect("Timed out URL should be completed");
    assert_eq!(info.status_code, None);
    assert_eq!(
        info.network_failure.as_ref().map(|failure| failure.kind),
        Some(NetworkErrorKind::Timeout)
    );

    // Error pages never take part in validation
    let failing = mapper
        .urls_failing_validation(BaseContentType::HtmlPage, ValidationArea::Title)
        .unwrap();
    assert!(failing.is_empty());
}

#[tokio::test]
async fn test_link_graph() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        &page("Home", r#"<a href="/a">A</a><a href="/b">B</a><a href="/a#top">A again</a>"#),
    )
    .await;
    mount_page(&mock_server, "/a", &page("A", r#"<a href="/b">B</a>"#)).await;
    mount_page(&mock_server, "/b", &page("B", r#"<a href="/">Home</a>"#)).await;

    let mapper = start_mapper(create_test_config(3), &mock_server);
    settle(&mapper).await;

    let home = url_for(&mock_server, "/");
    let a = url_for(&mock_server, "/a");
    let b = url_for(&mock_server, "/b");

    let mut from_home = mapper.urls_linked_by(&home);
    from_home.sort();
    assert_eq!(from_home, vec![a.clone(), b.clone()]);

    let mut to_b = mapper.urls_linking_to(&b);
    to_b.sort();
    let mut expected = vec![home.clone(), a.clone()];
    expected.sort();
    assert_eq!(to_b, expected);

    // Every edge is visible from both ends
    for source in [&home, &a, &b] {
        for target in mapper.urls_linked_by(source) {
            assert!(mapper.urls_linking_to(&target).contains(source));
        }
    }
}

#[tokio::test]
async fn test_additional_urls() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", &page("Home", "")).await;
    mount_page(&mock_server, "/hidden", &page("Hidden", "")).await;

    let mapper = start_mapper(create_test_config(2), &mock_server);
    assert_eq!(settle(&mapper).await, MapperState::Finished);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 1);

    let hidden = url_for(&mock_server, "/hidden");
    assert!(mapper.add_additional_url(&hidden).unwrap());
    // Already known, including spelling variants
    assert!(!mapper.add_additional_url(&hidden).unwrap());
    assert!(!mapper
        .add_additional_url(&Url::parse(&format!("{}/hidden/#x", mock_server.uri())).unwrap())
        .unwrap());
    // Outside the crawl
    assert!(!mapper
        .add_additional_url(&Url::parse("http://elsewhere.example.org/").unwrap())
        .unwrap());

    assert_eq!(settle(&mapper).await, MapperState::Finished);
    assert_eq!(mapper.count_loaded(BaseContentType::HtmlPage, None), 2);
    assert!(mapper.has_finished_requesting(&hidden));
}

#[tokio::test]
async fn test_progress_reports_each_url_once() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        &page("Home", r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#),
    )
    .await;
    for route in ["/a", "/b", "/c"] {
        mount_page(&mock_server, route, &page(route, r#"<a href="/">Home</a>"#)).await;
    }

    let seen: Arc<Mutex<Vec<Url>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mapper = PageMapper::new(create_test_config(2)).expect("Failed to create mapper");
    mapper.set_progress_callback(move |event| {
        sink.lock().unwrap().extend(event.urls.iter().cloned());
    });
    mapper
        .start(MappableUrl::parse(&format!("{}/", mock_server.uri())).unwrap())
        .unwrap();
    let mut events = mapper.subscribe();

    settle(&mapper).await;

    // The last batch may still be inside its window
    tokio::time::timeout(Duration::from_secs(5), async {
        while seen.lock().unwrap().len() < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Progress events did not arrive");

    let mut reported = seen.lock().unwrap().clone();
    reported.sort();
    let mut expected: Vec<Url> = ["/", "/a", "/b", "/c"]
        .iter()
        .map(|route| url_for(&mock_server, route))
        .collect();
    expected.sort();
    assert_eq!(reported, expected);

    // Subscribers see the same URLs
    let mut received = Vec::new();
    while received.len() < 4 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("Subscriber timed out")
            .expect("Channel closed early");
        received.extend(event.urls);
    }
    assert_eq!(received.len(), 4);

    mapper.cancel();
    assert!(events.recv().await.is_err());
}
