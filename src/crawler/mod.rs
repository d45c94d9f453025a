//! Crawler module for fetching and processing a site
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirect handling
//! - HTML parsing and link extraction
//! - Request scheduling and concurrency limiting
//! - Progress notification
//! - Overall crawl coordination through the `PageMapper` controller

mod coordinator;
mod fetcher;
mod notifier;
mod parser;
mod scheduler;
mod worker;

pub use coordinator::PageMapper;
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use notifier::{ProgressCallback, ProgressEvent};
pub use parser::{body_tag_offset, parse_html, ParsedPage};
pub use scheduler::{QueuedUrl, ScheduledFetch, Scheduler};
pub use worker::{analyse_html, process_url, CompletedFetch};
