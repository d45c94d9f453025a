//! URL handling module for PageMapper
//!
//! This module provides URL normalization (so different spellings of one
//! resource dedupe to one store entry) and scope resolution (whether a
//! discovered URL belongs to the crawl).

mod normalize;
mod scope;

// Re-export main functions
pub use normalize::{normalize, normalize_url};
pub use scope::{is_in_scope, MappableUrl};
