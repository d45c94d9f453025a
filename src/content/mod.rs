//! Content classification and validation
//!
//! - `classify`: base content type from MIME type / path, response type from status code
//! - `validation`: per-area judgments over completed HTML pages

mod classify;
mod validation;

pub use classify::{
    classify_content, classify_fetched, classify_response, has_feed_markers, mime_essence,
    BaseContentType, ResponseType,
};
pub use validation::{
    completely_validates, failing_areas, validated_value, validates, ValidatedStringValue,
    ValidationArea,
};
