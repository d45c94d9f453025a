//! Per-URL result records
//!
//! A `PageInfo` is built once by a fetch worker and is never mutated after it
//! lands in the store; consumers receive it behind an `Arc`.

use crate::content::{BaseContentType, ResponseType};
use chrono::{DateTime, Utc};
use std::fmt;
use url::Url;

/// The completed result of fetching one requested URL
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    /// The URL that was requested (the store key)
    pub requested_url: Url,

    /// The URL that produced the terminal response, after redirects
    ///
    /// `None` only when no response arrived at all.
    pub final_url: Option<Url>,

    /// HTTP status code of the terminal response
    pub status_code: Option<u16>,

    /// Set when the request failed below HTTP
    pub network_failure: Option<NetworkFailure>,

    pub base_content_type: BaseContentType,

    /// MIME essence of the `Content-Type` header (lowercase, no parameters)
    pub mime_type: Option<String>,

    /// Size of the response body in bytes
    pub byte_count: usize,

    /// Extracted document details, present for HTML pages only
    pub html: Option<HtmlContent>,

    pub fetched_at: DateTime<Utc>,
}

impl PageInfo {
    /// Builds the record for a request that never received a response
    pub fn from_network_failure(
        requested_url: Url,
        expected: BaseContentType,
        failure: NetworkFailure,
    ) -> Self {
        Self {
            requested_url,
            final_url: None,
            status_code: None,
            network_failure: Some(failure),
            base_content_type: expected,
            mime_type: None,
            byte_count: 0,
            html: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn response_type(&self) -> ResponseType {
        ResponseType::for_outcome(self.status_code)
    }

    /// Returns true if the terminal response came from a different URL
    pub fn was_redirected(&self) -> bool {
        self.final_url
            .as_ref()
            .map_or(false, |final_url| *final_url != self.requested_url)
    }

    /// All outgoing links (empty for non-HTML resources)
    pub fn links(&self) -> &[PageLink] {
        match &self.html {
            Some(html) => &html.links,
            None => &[],
        }
    }

    /// Deduplicated anchor targets in document order
    pub fn anchor_targets(&self) -> Vec<Url> {
        let mut targets: Vec<Url> = Vec::new();
        for link in self.links() {
            if link.kind == LinkKind::Anchor && !targets.contains(&link.url) {
                targets.push(link.url.clone());
            }
        }
        targets
    }
}

/// Details extracted from an HTML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlContent {
    /// Text of every `<title>` element, in document order
    pub titles: Vec<String>,

    /// Text of every `<h1>` element, in document order
    pub h1_headings: Vec<String>,

    /// Content of the first `<meta name="description">`
    pub meta_description: Option<String>,

    /// Bytes before the `<body` open tag
    pub byte_count_before_body: Option<usize>,

    /// Bytes from the `<body` open tag to the end of the document
    pub byte_count_after_body: Option<usize>,

    /// `<a href>` links pointing inside the crawl scope
    pub internal_link_count: usize,

    /// `<a href>` links pointing outside the crawl scope
    pub external_link_count: usize,

    pub links: Vec<PageLink>,
}

/// One outgoing reference from an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute, normalized target
    pub url: Url,
    pub kind: LinkKind,
    pub in_scope: bool,
}

/// The element a link was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// `<a href>`
    Anchor,
    /// `<img src>`
    Image,
    /// `<link rel="alternate">` with a feed type
    Feed,
}

impl LinkKind {
    /// The content type a target is expected to have before it is fetched
    pub fn expected_content_type(&self) -> BaseContentType {
        match self {
            Self::Anchor => BaseContentType::HtmlPage,
            Self::Image => BaseContentType::Image,
            Self::Feed => BaseContentType::Feed,
        }
    }
}

/// A failure that prevented any HTTP response from arriving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFailure {
    pub kind: NetworkErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    Timeout,
    /// DNS failure, refused connection, TLS handshake failure
    Connect,
    /// The connection broke while the body was being read
    Body,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connection failed",
            Self::Body => "body read failed",
            Self::Other => "request failed",
        };
        f.write_str(label)
    }
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// How a redirect target was reached
///
/// Stored under the final URL so a target can report "arrived via a 301 from X".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectInfo {
    pub requested_url: Url,
    pub final_url: Url,
    pub hops: Vec<RedirectHop>,
}

impl RedirectInfo {
    /// Status code of the first hop in the chain
    pub fn status_code(&self) -> Option<u16> {
        self.hops.first().map(|hop| hop.status_code)
    }

    pub fn status_codes(&self) -> Vec<u16> {
        self.hops.iter().map(|hop| hop.status_code).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    pub from: Url,
    pub to: Url,
    pub status_code: u16,
}
