//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: where an individual URL is (queued, in flight, completed)
//! - `MapperState`: where the controller is (idle, crawling, paused, finished, cancelled)

mod page_state;
mod session_state;

// Re-export main types
pub use page_state::CrawlState;
pub use session_state::MapperState;
