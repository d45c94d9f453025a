//! HTML parser for extracting links and page details
//!
//! This module handles parsing HTML content to extract:
//! - Every `<title>` and `<h1>` (validation needs the count, not just the first)
//! - The meta description
//! - Anchor, image and feed targets, resolved against `<base href>` if present
//!
//! `scraper` never fails on malformed markup; anything it cannot find is
//! simply reported as missing.

use crate::url::normalize;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// MIME types that mark a `<link rel="alternate">` as a feed
const FEED_LINK_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/feed+json",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Trimmed text of each `<title>`, in document order
    pub titles: Vec<String>,

    /// Trimmed text of each `<h1>`, in document order
    pub h1_headings: Vec<String>,

    /// `content` of the first `<meta name="description">`
    pub meta_description: Option<String>,

    /// Every `<a href>` target, one entry per occurrence
    pub anchors: Vec<Url>,

    /// Every `<img src>` target
    pub images: Vec<Url>,

    /// `<link rel="alternate">` targets with a feed MIME type
    pub feeds: Vec<Url>,
}

/// Parses HTML content and extracts links and page details
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `<img src="...">`
/// - `<link rel="alternate" type="application/rss+xml" href="...">` (and Atom / JSON Feed)
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// All targets are absolute and normalized.
///
/// # Example
///
/// ```
/// use page_mapper::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.titles, vec!["Test".to_string()]);
/// assert_eq!(parsed.anchors[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, page_url);

    ParsedPage {
        titles: element_texts(&document, "title"),
        h1_headings: element_texts(&document, "h1"),
        meta_description: extract_meta_description(&document),
        anchors: extract_anchors(&document, &base_url),
        images: extract_attr_links(&document, "img[src]", "src", &base_url),
        feeds: extract_feeds(&document, &base_url),
    }
}

/// Elements whose text content is never markup
const RAW_TEXT_TAGS: &[&[u8]] = &[b"script", b"style"];

/// Finds the byte offset of the `<body` open tag in a raw document
///
/// Matching is case-insensitive and requires the tag name to end there, so
/// `<bodyguard>` does not count. Comments and the contents of `<script>` and
/// `<style>` are skipped.
pub fn body_tag_offset(bytes: &[u8]) -> Option<usize> {
    let mut pos = 0;

    while let Some(found) = bytes[pos..].iter().position(|&b| b == b'<') {
        let start = pos + found;
        let rest = &bytes[start..];

        if rest.starts_with(b"<!--") {
            pos = start + find_ignore_case(rest, b"-->")? + 3;
            continue;
        }

        if let Some(tag) = RAW_TEXT_TAGS.iter().find(|tag| is_open_tag(rest, tag)) {
            let close = [b"</".as_slice(), *tag].concat();
            pos = start + find_ignore_case(rest, &close)? + close.len();
            continue;
        }

        if is_open_tag(rest, b"body") {
            return Some(start);
        }
        pos = start + 1;
    }

    None
}

/// Returns true if `rest` starts with `<name` and the tag name ends there
fn is_open_tag(rest: &[u8], name: &[u8]) -> bool {
    rest.len() > name.len()
        && rest[1..=name.len()].eq_ignore_ascii_case(name)
        && rest.get(name.len() + 1).copied().map_or(true, |b| {
            matches!(b, b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r' | 0x0c)
        })
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// The URL relative links resolve against: `<base href>` when present
fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or_else(|| page_url.clone())
}

fn element_texts(document: &Html, tag: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(tag) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| !in_foreign_content(*element))
        .map(collapsed_text)
        .collect()
}

/// Returns true for elements inside inline `<svg>` or `<math>`
///
/// An SVG `<title>` labels the graphic, not the document.
fn in_foreign_content(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| matches!(ancestor.value().name(), "svg" | "math"))
}

/// Element text with runs of whitespace collapsed to single spaces
fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_meta_description(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta[name]").ok()?;

    document
        .select(&selector)
        .find(|element| {
            element
                .value()
                .attr("name")
                .map_or(false, |name| name.trim().eq_ignore_ascii_case("description"))
        })
        .map(|element| {
            element
                .value()
                .attr("content")
                .unwrap_or_default()
                .trim()
                .to_string()
        })
}

fn extract_anchors(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        // Skip if it has the download attribute
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

fn extract_attr_links(document: &Html, css: &str, attr: &str, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

fn extract_feeds(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("link[rel][href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| {
            let value = element.value();
            let is_alternate = value.attr("rel").map_or(false, |rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("alternate"))
            });
            let is_feed_type = value.attr("type").map_or(false, |mime| {
                let mime = mime.trim().to_ascii_lowercase();
                FEED_LINK_TYPES.contains(&mime.as_str())
            });
            is_alternate && is_feed_type
        })
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves a link href to an absolute, normalized URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only and empty hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    normalize(&absolute_url).ok()
}
