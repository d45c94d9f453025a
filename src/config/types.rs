use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for PageMapper
///
/// Every key has a default, so an empty file (or no file at all) yields a
/// usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight at once
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,

    /// Maximum number of redirect hops followed per request
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Whole-request timeout in seconds; the transport default when absent
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Connect timeout in seconds; the transport default when absent
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    /// Window in which completed URLs are batched into one progress event (milliseconds)
    #[serde(default = "default_progress_coalesce_ms")]
    pub progress_coalesce_ms: u64,

    /// Whether same-host `<img src>` targets are fetched
    #[serde(default = "default_true")]
    pub crawl_images: bool,

    /// Whether same-host feed links are fetched
    #[serde(default = "default_true")]
    pub crawl_feeds: bool,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn progress_coalesce(&self) -> Duration {
        Duration::from_millis(self.progress_coalesce_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_redirects: default_max_redirects(),
            request_timeout_secs: None,
            connect_timeout_secs: None,
            progress_coalesce_ms: default_progress_coalesce_ms(),
            crawl_images: true,
            crawl_feeds: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value
    ///
    /// `Name/Version`, or `Name/Version (+ContactURL)` when a contact URL is set.
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

fn default_max_concurrent_fetches() -> u32 {
    4
}

fn default_max_redirects() -> u32 {
    10
}

fn default_progress_coalesce_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_crawler_name() -> String {
    "PageMapper".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
