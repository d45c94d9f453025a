//! Validation judgments over completed pages
//!
//! Judgments are derived on demand from a `PageInfo` and never cached, so
//! they always reflect the record as it currently stands.

use crate::storage::PageInfo;
use std::fmt;

/// A dimension on which an HTML page can be judged valid or invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationArea {
    MimeType,
    Title,
    Heading,
    MetaDescription,
}

impl ValidationArea {
    pub const ALL: [ValidationArea; 4] = [
        Self::MimeType,
        Self::Title,
        Self::Heading,
        Self::MetaDescription,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::MimeType => "MIME type",
            Self::Title => "title",
            Self::Heading => "h1",
            Self::MetaDescription => "meta description",
        }
    }
}

impl fmt::Display for ValidationArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a validated field reads for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedStringValue {
    Valid(String),
    Missing,
    Empty,
    Multiple,
    Invalid,
}

impl ValidatedStringValue {
    /// Reads a field that may occur any number of times in a document
    pub fn from_occurrences(values: &[String]) -> Self {
        match values {
            [] => Self::Missing,
            [only] => Self::from_optional(Some(only.as_str())),
            _ => Self::Multiple,
        }
    }

    /// Reads a field that occurs at most once
    pub fn from_optional(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None => Self::Missing,
            Some("") => Self::Empty,
            Some(text) => Self::Valid(text.to_string()),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

impl fmt::Display for ValidatedStringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(text) => f.write_str(text),
            Self::Missing => f.write_str("(none)"),
            Self::Empty => f.write_str("(empty)"),
            Self::Multiple => f.write_str("(multiple)"),
            Self::Invalid => f.write_str("(invalid)"),
        }
    }
}

/// The display reading of one validation area of a page
pub fn validated_value(info: &PageInfo, area: ValidationArea) -> ValidatedStringValue {
    match area {
        ValidationArea::MimeType => match info.mime_type.as_deref() {
            None => ValidatedStringValue::Missing,
            Some("text/html") => ValidatedStringValue::Valid("text/html".to_string()),
            Some(_) => ValidatedStringValue::Invalid,
        },
        ValidationArea::Title => info
            .html
            .as_ref()
            .map_or(ValidatedStringValue::Missing, |html| {
                ValidatedStringValue::from_occurrences(&html.titles)
            }),
        ValidationArea::Heading => info
            .html
            .as_ref()
            .map_or(ValidatedStringValue::Missing, |html| {
                ValidatedStringValue::from_occurrences(&html.h1_headings)
            }),
        ValidationArea::MetaDescription => ValidatedStringValue::from_optional(
            info.html
                .as_ref()
                .and_then(|html| html.meta_description.as_deref()),
        ),
    }
}

/// Judges one validation area of a page
///
/// - MIME type: exactly `text/html`
/// - Title: exactly one `<title>`, not blank
/// - Heading: exactly one `<h1>`
/// - Meta description: present and not blank
pub fn validates(info: &PageInfo, area: ValidationArea) -> bool {
    match area {
        ValidationArea::MimeType => info.mime_type.as_deref() == Some("text/html"),
        ValidationArea::Title => validated_value(info, area).is_valid(),
        ValidationArea::Heading => info
            .html
            .as_ref()
            .map_or(false, |html| html.h1_headings.len() == 1),
        ValidationArea::MetaDescription => validated_value(info, area).is_valid(),
    }
}

/// Returns true if every validation area passes
pub fn completely_validates(info: &PageInfo) -> bool {
    ValidationArea::ALL
        .iter()
        .all(|area| validates(info, *area))
}

/// The areas a page fails, in declaration order
pub fn failing_areas(info: &PageInfo) -> Vec<ValidationArea> {
    ValidationArea::ALL
        .iter()
        .copied()
        .filter(|area| !validates(info, *area))
        .collect()
}
