use anyhow::{Context, Result};
use clap::Parser;
use crawler::{CrawlConfig, Crawler, HttpFetcher, DEFAULT_LIMIT};
use search_core::output::{DEFAULT_INDEX_PATH, DEFAULT_LOCATIONS_PATH, DEFAULT_RESULTS_PATH};
use search_core::{Report, SharedIndex, WorkQueue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl the web into an in-memory inverted index and answer queries")]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(long)]
    seed: String,
    /// Maximum number of pages to visit
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,
    /// Number of worker threads
    #[arg(long, default_value_t = WorkQueue::DEFAULT_THREADS)]
    threads: usize,
    /// Fetch attempts per page before giving up
    #[arg(long, default_value_t = HttpFetcher::DEFAULT_RETRIES)]
    retries: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// Write the index as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_INDEX_PATH)]
    index: Option<PathBuf>,
    /// Write per-page word counts as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_LOCATIONS_PATH)]
    locations: Option<PathBuf>,
    /// Query file, one query per line
    #[arg(long)]
    queries: Option<PathBuf>,
    /// Match whole words only instead of prefixes
    #[arg(long, default_value_t = false)]
    exact: bool,
    /// Write search results as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_RESULTS_PATH)]
    results: Option<PathBuf>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    // everything that can be wrong with the arguments fails before any work starts
    let seed = Url::parse(&args.seed).with_context(|| format!("illegal seed url: {}", args.seed))?;
    let queue = Arc::new(WorkQueue::new(args.threads)?);
    let index = Arc::new(SharedIndex::new());
    let fetcher = HttpFetcher::new(args.retries, Duration::from_secs(args.timeout_secs))?;
    let crawler = Crawler::new(fetcher, Arc::clone(&index), Arc::clone(&queue), CrawlConfig { limit: args.limit })?;

    tracing::info!(%seed, limit = args.limit, threads = args.threads, "crawler starting");
    let visited = crawler.crawl(&seed)?;
    tracing::info!(visited, words = index.len(), "crawl finished");

    let report = Report {
        index: args.index,
        locations: args.locations,
        queries: args.queries,
        exact: args.exact,
        results: args.results,
    };
    report.run(&index, &queue)?;
    queue.shutdown();
    Ok(())
}
