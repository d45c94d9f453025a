use crate::url::normalize::{normalize, normalize_url};
use crate::{UrlError, UrlResult};
use url::Url;

/// The primary URL of a crawl session together with its derived scope
///
/// Created once per session and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappableUrl {
    primary: Url,
    host: String,
    port: Option<u16>,
}

impl MappableUrl {
    /// Parses and normalizes a primary URL
    ///
    /// # Examples
    ///
    /// ```
    /// use page_mapper::url::MappableUrl;
    ///
    /// let mappable = MappableUrl::parse("https://www.Example.com/blog/").unwrap();
    /// assert_eq!(mappable.primary_url().as_str(), "https://www.example.com/blog");
    /// assert_eq!(mappable.host(), "example.com");
    /// ```
    pub fn parse(url_str: &str) -> UrlResult<Self> {
        Self::from_url(&normalize_url(url_str)?)
    }

    pub fn from_url(url: &Url) -> UrlResult<Self> {
        let primary = normalize(url)?;
        let host = scope_host(&primary).ok_or(UrlError::MissingHost)?;
        let port = effective_port(&primary);

        Ok(Self {
            primary,
            host,
            port,
        })
    }

    pub fn primary_url(&self) -> &Url {
        &self.primary
    }

    /// The host used for scope matching (lowercase, without a `www.` prefix)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns true if `url` belongs to this crawl
    pub fn contains(&self, url: &Url) -> bool {
        is_in_scope(url, self)
    }
}

/// Decides whether a URL belongs to the crawl rooted at `scope`
///
/// The host must match the primary host. The comparison ignores case, a
/// leading `www.` and the scheme; ports are compared after the default
/// ports of http and https are dropped.
///
/// # Examples
///
/// ```
/// use page_mapper::url::{is_in_scope, MappableUrl};
/// use url::Url;
///
/// let scope = MappableUrl::parse("http://example.com/").unwrap();
/// assert!(is_in_scope(&Url::parse("https://example.com/about").unwrap(), &scope));
/// assert!(!is_in_scope(&Url::parse("http://cdn.example.net/logo.png").unwrap(), &scope));
/// ```
pub fn is_in_scope(url: &Url, scope: &MappableUrl) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    match scope_host(url) {
        Some(host) => host == scope.host && effective_port(url) == scope.port,
        None => false,
    }
}

/// Extracts the host used for scope comparison
fn scope_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    if host.is_empty() {
        return None;
    }

    Some(match host.strip_prefix("www.") {
        Some(bare) if !bare.is_empty() => bare.to_string(),
        _ => host,
    })
}

/// The port of a URL, with the http and https defaults treated as unspecified
fn effective_port(url: &Url) -> Option<u16> {
    match url.port_or_known_default() {
        Some(80) | Some(443) | None => None,
        port => port,
    }
}
