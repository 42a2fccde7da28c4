//! Bounded breadth-first crawl into a shared index.
//!
//! Each page is fetched, stemmed into a local index and merged with one
//! `add_all`. New links are admitted under the frontier lock, which is the only
//! place the visit cap is checked, so the cap holds however many pages are in
//! flight.

pub mod fetch;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use search_core::builder::stem_text;
use search_core::{Error, Result, SharedIndex, WorkQueue};
use tracing::{debug, info, warn};
use url::Url;

pub use fetch::{normalize, parse_page, HttpFetcher, Page, PageFetcher};

pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct CrawlConfig {
    /// Maximum number of distinct URLs visited or queued.
    pub limit: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self { limit: DEFAULT_LIMIT }
    }
}

/// Visited or queued URLs, capped at `limit`. Only ever grows.
struct Frontier {
    seen: Mutex<HashSet<String>>,
    limit: usize,
}

impl Frontier {
    fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

struct Context<F> {
    fetcher: F,
    index: Arc<SharedIndex>,
    queue: Arc<WorkQueue>,
    frontier: Frontier,
}

pub struct Crawler<F: PageFetcher> {
    ctx: Arc<Context<F>>,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(fetcher: F, index: Arc<SharedIndex>, queue: Arc<WorkQueue>, config: CrawlConfig) -> Result<Self> {
        if config.limit == 0 {
            return Err(Error::InvalidConfig("crawl limit must be at least 1".into()));
        }
        let frontier = Frontier { seen: Mutex::new(HashSet::new()), limit: config.limit };
        Ok(Self { ctx: Arc::new(Context { fetcher, index, queue, frontier }) })
    }

    /// Crawls from `seed` until the frontier is exhausted or the cap is hit, and
    /// returns the number of URLs visited.
    pub fn crawl(&self, seed: &Url) -> Result<usize> {
        let seed = normalize(seed);
        let admitted = {
            let mut seen = self.ctx.frontier.seen.lock();
            seen.len() < self.ctx.frontier.limit && seen.insert(seed.to_string())
        };
        if admitted {
            submit(&self.ctx, seed.clone())?;
        }
        self.ctx.queue.finish();

        let visited = self.visited();
        info!(%seed, visited, words = self.ctx.index.len(), "crawl complete");
        Ok(visited)
    }

    pub fn visited(&self) -> usize {
        self.ctx.frontier.len()
    }

    pub fn visited_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.ctx.frontier.seen.lock().iter().cloned().collect();
        urls.sort();
        urls
    }
}

fn submit<F: PageFetcher>(ctx: &Arc<Context<F>>, url: Url) -> Result<()> {
    let task_ctx = Arc::clone(ctx);
    ctx.queue.execute(move || crawl_page(&task_ctx, url))
}

fn crawl_page<F: PageFetcher>(ctx: &Arc<Context<F>>, url: Url) {
    let page = match ctx.fetcher.fetch(&url) {
        Ok(page) => page,
        Err(err) => {
            warn!(%url, error = %err, "unable to fetch page");
            return;
        }
    };

    ctx.index.add_all(stem_text(&page.text, url.as_str()));
    debug!(%url, links = page.links.len(), "indexed page");

    if ctx.frontier.len() >= ctx.frontier.limit {
        return;
    }

    let mut seen = ctx.frontier.seen.lock();
    for link in page.links {
        if seen.len() >= ctx.frontier.limit {
            break;
        }
        let link = normalize(&link);
        if !seen.insert(link.to_string()) {
            continue;
        }
        if let Err(err) = submit(ctx, link) {
            warn!(error = %err, "unable to schedule link");
            break;
        }
    }
}
