//! Per-URL listings for the command line

use crate::content::{failing_areas, BaseContentType, ResponseType};
use crate::storage::{PageLookup, PageQuery};
use url::Url;

/// One line of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub url: Url,
    /// Status code, response bucket, or "pending"
    pub status: String,
    /// Failed validation areas, comma separated (HTML pages only)
    pub problems: Option<String>,
}

/// Builds listing rows for every discovered URL of one base type
pub fn listing_rows(query: &dyn PageQuery, base: BaseContentType) -> Vec<ListingRow> {
    query
        .urls(base, None)
        .into_iter()
        .map(|url| {
            let (status, problems) = match query.lookup(&url) {
                PageLookup::Completed(info) => {
                    let status = match info.status_code {
                        Some(code) => code.to_string(),
                        None => match &info.network_failure {
                            Some(failure) => failure.kind.to_string(),
                            None => ResponseType::NetworkError.to_string(),
                        },
                    };

                    let problems = if info.base_content_type == BaseContentType::HtmlPage
                        && info.response_type() == ResponseType::Successful
                    {
                        let failing = failing_areas(&info);
                        if failing.is_empty() {
                            None
                        } else {
                            Some(
                                failing
                                    .iter()
                                    .map(|area| area.label())
                                    .collect::<Vec<_>>()
                                    .join(", "),
                            )
                        }
                    } else {
                        None
                    };

                    (status, problems)
                }
                PageLookup::Pending(state) => (format!("pending ({})", state), None),
                PageLookup::Unknown => ("unknown".to_string(), None),
            };

            ListingRow {
                url,
                status,
                problems,
            }
        })
        .collect()
}

/// Prints the listing for one base type to stdout
pub fn print_listing(query: &dyn PageQuery, base: BaseContentType) {
    let rows = listing_rows(query, base);
    println!("=== {} ({}) ===\n", base, rows.len());

    for row in rows {
        match row.problems {
            Some(problems) => println!("  [{}] {}  invalid: {}", row.status, row.url, problems),
            None => println!("  [{}] {}", row.status, row.url),
        }
    }
    println!();
}
