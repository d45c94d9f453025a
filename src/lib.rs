//! PageMapper: a site-crawl engine
//!
//! This crate discovers, fetches, classifies and validates the pages, images
//! and feeds that belong to one website, and exposes a read-only query surface
//! over the results while the crawl is still running.

pub mod config;
pub mod content;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for PageMapper operations
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::MapperState,
        to: state::MapperState,
    },

    #[error("No crawl session to {0}")]
    NoSession(&'static str),

    #[error("PageMapper must be created inside a tokio runtime")]
    NoRuntime,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for PageMapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use content::{BaseContentType, ResponseType, ValidatedStringValue, ValidationArea};
pub use crawler::{PageMapper, ProgressEvent};
pub use state::{CrawlState, MapperState};
pub use storage::{PageInfo, PageLookup, PageQuery, PageStore, RedirectInfo};
pub use self::url::{is_in_scope, normalize_url, MappableUrl};
