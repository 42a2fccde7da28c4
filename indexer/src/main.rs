use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use search_core::builder::build_index;
use search_core::output::{DEFAULT_INDEX_PATH, DEFAULT_LOCATIONS_PATH, DEFAULT_RESULTS_PATH};
use search_core::{Report, SharedIndex, WorkQueue};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build an in-memory inverted index from text files and answer queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every .txt/.text file under a path
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        path: PathBuf,
        /// Number of worker threads
        #[arg(long, default_value_t = WorkQueue::DEFAULT_THREADS)]
        threads: usize,
        /// Write the index as JSON
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_INDEX_PATH)]
        index: Option<PathBuf>,
        /// Write per-document word counts as JSON
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
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { path, threads, index, locations, queries, exact, results } => {
            let report = Report { index, locations, queries, exact, results };
            run(&path, threads, &report)
        }
    }
}

fn run(path: &Path, threads: usize, report: &Report) -> Result<()> {
    let queue = Arc::new(WorkQueue::new(threads)?);
    let index = Arc::new(SharedIndex::new());

    let files = build_index(path, &index, &queue)
        .with_context(|| format!("unable to index {}", path.display()))?;
    tracing::info!(files, words = index.len(), threads, "index ready");

    report.run(&index, &queue)?;
    queue.shutdown();
    Ok(())
}
