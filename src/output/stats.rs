//! Statistics generation from crawl results
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics through the `PageQuery` surface, so it works the same
//! against a bare `PageStore` or a live `PageMapper`.

use crate::content::{BaseContentType, ResponseType, ValidationArea};
use crate::storage::{PageQuery, StoreResult};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Discovered URLs (pending or completed) by base type
    pub requested: BTreeMap<BaseContentType, usize>,

    /// Completed URLs by base type
    pub loaded: BTreeMap<BaseContentType, usize>,

    /// Completed URLs by base type and response bucket; empty buckets are omitted
    pub by_response: BTreeMap<(BaseContentType, ResponseType), usize>,

    /// Successful HTML pages failing each validation area
    pub validation_failures: BTreeMap<ValidationArea, usize>,

    /// Successful HTML pages passing every validation area
    pub fully_validating: usize,
}

impl CrawlStatistics {
    pub fn total_requested(&self) -> usize {
        self.requested.values().sum()
    }

    pub fn total_loaded(&self) -> usize {
        self.loaded.values().sum()
    }

    /// Completed URLs in an error bucket (4xx, 5xx, network, unknown)
    pub fn total_errors(&self) -> usize {
        self.by_response
            .iter()
            .filter(|((_, response), _)| response.is_error())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Loads statistics from any query surface
pub fn load_statistics(query: &dyn PageQuery) -> StoreResult<CrawlStatistics> {
    let mut stats = CrawlStatistics::default();

    for base in BaseContentType::ALL {
        stats.requested.insert(base, query.count_requested(base));
        stats.loaded.insert(base, query.count_loaded(base, None));

        for response in ResponseType::ALL {
            let count = query.count_loaded(base, Some(response));
            if count > 0 {
                stats.by_response.insert((base, response), count);
            }
        }
    }

    for area in ValidationArea::ALL {
        let failing = query.urls_failing_validation(BaseContentType::HtmlPage, area)?;
        stats.validation_failures.insert(area, failing.len());
    }

    stats.fully_validating = query
        .urls_fully_validating(BaseContentType::HtmlPage)?
        .len();

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total URLs discovered: {}", stats.total_requested());
    println!("  Total URLs loaded: {}", stats.total_loaded());
    println!("  Total errors: {}", stats.total_errors());
    println!();

    for base in BaseContentType::ALL {
        let requested = stats.requested.get(&base).copied().unwrap_or(0);
        if requested == 0 {
            continue;
        }
        let loaded = stats.loaded.get(&base).copied().unwrap_or(0);

        println!("{} ({} of {} loaded):", base, loaded, requested);
        for response in ResponseType::ALL {
            if let Some(count) = stats.by_response.get(&(base, response)) {
                println!("  {}: {}", response, count);
            }
        }
        println!();
    }

    let html_loaded = stats
        .by_response
        .get(&(BaseContentType::HtmlPage, ResponseType::Successful))
        .copied()
        .unwrap_or(0);

    if html_loaded > 0 {
        println!("Validation:");
        for (area, count) in &stats.validation_failures {
            println!("  Invalid {}: {}", area, count);
        }

        let percentage = (stats.fully_validating as f64 / html_loaded as f64) * 100.0;
        println!(
            "  Fully validating: {} of {} ({:.1}%)",
            stats.fully_validating, html_loaded, percentage
        );
        println!();
    }
}
