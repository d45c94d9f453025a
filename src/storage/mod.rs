//! Storage module for crawl results
//!
//! This module holds everything a session knows about the URLs it has seen:
//! - Per-URL crawl state and the immutable result records
//! - The link graph between completed HTML pages
//! - Redirect chains, keyed by the URL they ended at
//!
//! Nothing is persisted; a new session starts from an empty store.

mod page_info;
mod page_store;
mod traits;

pub use page_info::{
    HtmlContent, LinkKind, NetworkErrorKind, NetworkFailure, PageInfo, PageLink, RedirectHop,
    RedirectInfo,
};
pub use page_store::{DiscoveryPolicy, PageStore};
pub use traits::{PageLinkFilter, PageLookup, PageQuery, StoreError, StoreResult};

pub(crate) use traits::require_html;
