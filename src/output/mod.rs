//! Output module for crawl summaries
//!
//! This module handles:
//! - Aggregate statistics per content type, response bucket and validation area
//! - Per-URL listings with status and validation problems

mod listing;
pub mod stats;

pub use listing::{listing_rows, print_listing, ListingRow};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
