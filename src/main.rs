//! PageMapper main entry point
//!
//! This is the command-line interface for the PageMapper site crawler.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use page_mapper::config::{load_config_with_hash, Config};
use page_mapper::output::{load_statistics, print_listing, print_statistics};
use page_mapper::{BaseContentType, MappableUrl, PageMapper};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// PageMapper: maps the pages, images and feeds of one website
///
/// PageMapper crawls every page reachable from the given URL on the same
/// host, records how each one responded, and checks HTML pages for a single
/// title, a single h1 and a meta description.
#[derive(Parser, Debug)]
#[command(name = "page-mapper")]
#[command(version)]
#[command(about = "Maps and validates the pages of one website", long_about = None)]
struct Cli {
    /// URL the crawl starts from; its host defines the crawl scope
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Maximum number of concurrent fetches (overrides the config file)
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// After the crawl, list every URL of this kind with its status
    #[arg(long, value_enum, value_name = "KIND")]
    list: Option<ListKind>,

    /// Validate config and URL without crawling
    #[arg(long)]
    dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ListKind {
    Pages,
    Images,
    Feeds,
    Other,
}

impl From<ListKind> for BaseContentType {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Pages => BaseContentType::HtmlPage,
            ListKind::Images => BaseContentType::Image,
            ListKind::Feeds => BaseContentType::Feed,
            ListKind::Other => BaseContentType::Other,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent_fetches = concurrency;
    }

    let primary = MappableUrl::parse(&cli.url)
        .with_context(|| format!("invalid start URL: {}", cli.url))?;

    if cli.dry_run {
        handle_dry_run(&config, &primary)?;
        return Ok(());
    }

    handle_crawl(config, primary, cli.list.map(BaseContentType::from)).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("page_mapper=info,warn"),
            1 => EnvFilter::new("page_mapper=debug,info"),
            2 => EnvFilter::new("page_mapper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, primary: &MappableUrl) -> anyhow::Result<()> {
    page_mapper::config::validate(config)?;

    println!("=== PageMapper Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Max redirects: {}", config.crawler.max_redirects);
    match config.crawler.request_timeout_secs {
        Some(secs) => println!("  Request timeout: {}s", secs),
        None => println!("  Request timeout: transport default"),
    }
    println!(
        "  Progress coalescing: {}ms",
        config.crawler.progress_coalesce_ms
    );
    println!("  Crawl images: {}", config.crawler.crawl_images);
    println!("  Crawl feeds: {}", config.crawler.crawl_feeds);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nScope:");
    println!("  Start URL: {}", primary.primary_url());
    println!("  Host: {}", primary.host());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    primary: MappableUrl,
    list: Option<BaseContentType>,
) -> anyhow::Result<()> {
    let mapper = PageMapper::new(config)?;

    let completed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completed);
    mapper.set_progress_callback(move |event| {
        let total = counter.fetch_add(event.urls.len(), Ordering::Relaxed) + event.urls.len();
        tracing::debug!("{} URL(s) completed ({} total)", event.urls.len(), total);
    });

    mapper.start(primary)?;

    let interrupted = tokio::select! {
        state = mapper.wait_until_settled() => {
            tracing::info!("Crawl {}", state);
            false
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::warn!("Interrupted, stopping crawl");
            if let Err(e) = mapper.pause() {
                tracing::debug!("Crawl already stopped: {}", e);
            }
            true
        }
    };

    let stats = load_statistics(&mapper)?;
    print_statistics(&stats);

    if let Some(base) = list {
        print_listing(&mapper, base);
    }

    if interrupted {
        mapper.cancel();
    }

    tracing::info!(
        "{} URL(s) fetched, state: {}",
        completed.load(Ordering::Relaxed),
        mapper.state()
    );

    Ok(())
}
