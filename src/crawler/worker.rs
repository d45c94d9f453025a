//! Fetch worker
//!
//! Turns one queued URL into a completed `PageInfo`: fetch, classify, and
//! for successful HTML pages, parse. Every outcome produces a record;
//! failures are data here, not errors.

use crate::config::CrawlerConfig;
use crate::content::{classify_fetched, mime_essence, BaseContentType, ResponseType};
use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::parser::{body_tag_offset, parse_html};
use crate::crawler::scheduler::QueuedUrl;
use crate::storage::{HtmlContent, LinkKind, PageInfo, PageLink, RedirectInfo};
use crate::url::MappableUrl;
use chrono::Utc;
use reqwest::Client;
use url::Url;

/// The outcome of processing one URL, ready to be recorded
#[derive(Debug)]
pub struct CompletedFetch {
    /// The store key the result belongs to
    pub requested: Url,
    pub info: PageInfo,
    /// Present when at least one redirect was followed
    pub redirect: Option<RedirectInfo>,
}

/// Fetches and analyses one URL
pub async fn process_url(
    client: &Client,
    config: &CrawlerConfig,
    scope: &MappableUrl,
    queued: QueuedUrl,
) -> CompletedFetch {
    let QueuedUrl { url, expected } = queued;

    match fetch_url(client, &url, config.max_redirects).await {
        FetchResult::Response {
            final_url,
            status_code,
            content_type,
            body,
            hops,
        } => {
            let base_content_type =
                classify_fetched(content_type.as_deref(), final_url.path(), &body);

            let html = if base_content_type == BaseContentType::HtmlPage
                && ResponseType::from_status(status_code) == ResponseType::Successful
            {
                Some(analyse_html(&body, &final_url, scope))
            } else {
                None
            };

            tracing::debug!(
                "Fetched {} -> {} ({:?}, {} bytes)",
                url,
                status_code,
                base_content_type,
                body.len()
            );

            let redirect = if hops.is_empty() {
                None
            } else {
                Some(RedirectInfo {
                    requested_url: url.clone(),
                    final_url: final_url.clone(),
                    hops,
                })
            };

            let info = PageInfo {
                requested_url: url.clone(),
                final_url: Some(final_url),
                status_code: Some(status_code),
                network_failure: None,
                base_content_type,
                mime_type: content_type.as_deref().and_then(mime_essence),
                byte_count: body.len(),
                html,
                fetched_at: Utc::now(),
            };

            CompletedFetch {
                requested: url,
                info,
                redirect,
            }
        }
        FetchResult::NetworkError { failure, hops } => {
            tracing::debug!(
                "Network error for {} after {} redirect(s): {}",
                url,
                hops.len(),
                failure
            );

            let redirect = hops.last().map(|last| RedirectInfo {
                requested_url: url.clone(),
                final_url: last.to.clone(),
                hops: hops.clone(),
            });

            CompletedFetch {
                info: PageInfo::from_network_failure(url.clone(), expected, failure),
                requested: url,
                redirect,
            }
        }
    }
}

/// Extracts page details and tags every link as in or out of scope
pub fn analyse_html(body: &[u8], page_url: &Url, scope: &MappableUrl) -> HtmlContent {
    let text = String::from_utf8_lossy(body);
    let parsed = parse_html(&text, page_url);

    let body_offset = body_tag_offset(body);

    let tag = |urls: Vec<Url>, kind: LinkKind| -> Vec<PageLink> {
        urls.into_iter()
            .map(|url| PageLink {
                in_scope: scope.contains(&url),
                url,
                kind,
            })
            .collect()
    };

    let mut links = tag(parsed.anchors, LinkKind::Anchor);
    let internal_link_count = links.iter().filter(|link| link.in_scope).count();
    let external_link_count = links.len() - internal_link_count;

    links.extend(tag(parsed.images, LinkKind::Image));
    links.extend(tag(parsed.feeds, LinkKind::Feed));

    HtmlContent {
        titles: parsed.titles,
        h1_headings: parsed.h1_headings,
        meta_description: parsed.meta_description,
        byte_count_before_body: body_offset,
        byte_count_after_body: body_offset.map(|offset| body.len() - offset),
        internal_link_count,
        external_link_count,
        links,
    }
}
