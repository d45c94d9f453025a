//! Content and response classification
//!
//! Pure functions that bucket a fetched resource by what it is (its base
//! content type) and by how the server answered (its response type).

use std::fmt;

const HTML_EXTENSIONS: &[&str] = &["html", "htm", "xhtml"];

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "bmp", "avif", "tif", "tiff",
];

const FEED_EXTENSIONS: &[&str] = &["rss", "atom"];

/// How many leading body bytes are inspected for feed markers
const FEED_SNIFF_LEN: usize = 1024;

/// Coarse classification of a fetched resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseContentType {
    HtmlPage,
    Image,
    Feed,
    Other,
}

impl BaseContentType {
    pub const ALL: [BaseContentType; 4] = [Self::HtmlPage, Self::Image, Self::Feed, Self::Other];

    pub fn label(&self) -> &'static str {
        match self {
            Self::HtmlPage => "Local Pages",
            Self::Image => "Images",
            Self::Feed => "Feeds",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for BaseContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classification bucket derived from the HTTP outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseType {
    /// 200–299
    Successful,
    /// 300–399, surfaced only when a redirect chain could not be followed to its end
    Redirects,
    /// 400–499
    RequestErrors,
    /// 500–599
    ResponseErrors,
    /// No HTTP response at all (timeout, DNS, connection refused, broken body)
    NetworkError,
    /// A status code outside 200–599
    Unknown,
}

impl ResponseType {
    pub const ALL: [ResponseType; 6] = [
        Self::Successful,
        Self::Redirects,
        Self::RequestErrors,
        Self::ResponseErrors,
        Self::NetworkError,
        Self::Unknown,
    ];

    /// Buckets an HTTP status code
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            200..=299 => Self::Successful,
            300..=399 => Self::Redirects,
            400..=499 => Self::RequestErrors,
            500..=599 => Self::ResponseErrors,
            _ => Self::Unknown,
        }
    }

    /// Buckets a fetch outcome, where `None` means no response was received
    pub fn for_outcome(status_code: Option<u16>) -> Self {
        status_code.map_or(Self::NetworkError, Self::from_status)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Successful => "[2xx] Successful",
            Self::Redirects => "[3xx] Redirects",
            Self::RequestErrors => "[4xx] Request Errors",
            Self::ResponseErrors => "[5xx] Response Errors",
            Self::NetworkError => "Network Errors",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Successful | Self::Redirects)
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Buckets an HTTP status code into a response type
pub fn classify_response(status_code: u16) -> ResponseType {
    ResponseType::from_status(status_code)
}

/// Extracts the lowercased MIME essence from a `Content-Type` header value
///
/// `"text/html; charset=UTF-8"` becomes `"text/html"`. Returns None for an
/// empty value.
pub fn mime_essence(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.is_empty() {
        None
    } else {
        Some(essence)
    }
}

/// Assigns a base content type from a MIME type and the URL path
///
/// The MIME type wins when present; the path is only consulted when the
/// server did not say, or to recognise feeds served as generic XML.
///
/// # Examples
///
/// ```
/// use page_mapper::content::{classify_content, BaseContentType};
///
/// assert_eq!(classify_content(Some("text/html"), "/"), BaseContentType::HtmlPage);
/// assert_eq!(classify_content(Some("image/png"), "/logo"), BaseContentType::Image);
/// assert_eq!(classify_content(None, "/about.html"), BaseContentType::HtmlPage);
/// assert_eq!(classify_content(Some("application/pdf"), "/doc.pdf"), BaseContentType::Other);
/// ```
pub fn classify_content(mime: Option<&str>, url_path: &str) -> BaseContentType {
    let mime = mime.and_then(mime_essence);

    match mime.as_deref() {
        Some("text/html") | Some("application/xhtml+xml") => BaseContentType::HtmlPage,
        Some(m) if m.starts_with("image/") => BaseContentType::Image,
        Some("application/rss+xml") | Some("application/atom+xml")
        | Some("application/feed+json") => BaseContentType::Feed,
        Some(m) if is_xml_mime(m) && has_feed_like_path(url_path) => BaseContentType::Feed,
        Some(_) => BaseContentType::Other,
        None => classify_path(url_path),
    }
}

/// Classifies a fetched resource, sniffing the body of generic XML for feed markers
pub fn classify_fetched(mime: Option<&str>, url_path: &str, body: &[u8]) -> BaseContentType {
    let by_headers = classify_content(mime, url_path);
    if by_headers != BaseContentType::Other {
        return by_headers;
    }

    let is_xml = mime
        .and_then(mime_essence)
        .map_or(false, |m| is_xml_mime(&m));

    if is_xml && has_feed_markers(body) {
        BaseContentType::Feed
    } else {
        by_headers
    }
}

/// Returns true if the start of a document looks like an RSS, Atom or RDF feed
pub fn has_feed_markers(body: &[u8]) -> bool {
    let head = &body[..body.len().min(FEED_SNIFF_LEN)];
    let text = String::from_utf8_lossy(head).to_ascii_lowercase();
    text.contains("<rss") || text.contains("<feed") || text.contains("<rdf:rdf")
}

fn is_xml_mime(mime: &str) -> bool {
    mime == "application/xml" || mime == "text/xml" || mime.ends_with("+xml")
}

fn classify_path(url_path: &str) -> BaseContentType {
    match path_extension(url_path) {
        None => BaseContentType::HtmlPage,
        Some(ext) if HTML_EXTENSIONS.contains(&ext.as_str()) => BaseContentType::HtmlPage,
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => BaseContentType::Image,
        Some(ext) if FEED_EXTENSIONS.contains(&ext.as_str()) => BaseContentType::Feed,
        Some(_) => BaseContentType::Other,
    }
}

fn has_feed_like_path(url_path: &str) -> bool {
    if let Some(ext) = path_extension(url_path) {
        if FEED_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
    }

    let last = last_segment(url_path).to_ascii_lowercase();
    last.contains("feed") || last.contains("rss") || last.contains("atom")
}

fn last_segment(url_path: &str) -> &str {
    url_path.rsplit('/').next().unwrap_or_default()
}

/// Lowercased extension of the last path segment, if it has one
fn path_extension(url_path: &str) -> Option<String> {
    let last = last_segment(url_path);
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}
