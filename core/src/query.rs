//! Query pipeline: one search task per query line, memoized per canonical key.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::index::SharedIndex;
use crate::output;
use crate::pool::WorkQueue;
use crate::ranking::SearchHit;
use crate::tokenizer::unique_stems;
use crate::{Error, Result};

/// Anything that can rank documents for a set of stemmed terms.
pub trait Searcher: Send + Sync + 'static {
    fn search(&self, terms: &BTreeSet<String>, exact: bool) -> Vec<SearchHit>;
}

impl Searcher for SharedIndex {
    fn search(&self, terms: &BTreeSet<String>, exact: bool) -> Vec<SearchHit> {
        SharedIndex::search(self, terms, exact)
    }
}

/// Distinct terms, sorted, joined by a single space.
pub fn query_key(terms: &BTreeSet<String>) -> String {
    terms.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

type SlotKey = (String, bool);

enum Slot {
    Pending,
    Ready(Vec<SearchHit>),
}

#[derive(Default)]
struct Slots {
    order: Vec<SlotKey>,
    entries: HashMap<SlotKey, Slot>,
}

/// Result table guarded by its own lock, separate from the index lock.
#[derive(Default)]
struct ResultTable {
    slots: Mutex<Slots>,
    resolved: Condvar,
}

enum Claim<'a> {
    Ready(Vec<SearchHit>),
    Reserved(Reservation<'a>),
}

impl ResultTable {
    /// Reserves `key` unless it is already resolved or being resolved.
    fn reserve(&self, key: &SlotKey) -> Option<Reservation<'_>> {
        let mut slots = self.slots.lock();
        if slots.entries.contains_key(key) {
            return None;
        }
        slots.entries.insert(key.clone(), Slot::Pending);
        Some(Reservation { table: self, key: key.clone(), resolved: false })
    }

    /// Like `reserve`, but waits out another resolver and hands back its result.
    fn claim(&self, key: &SlotKey) -> Claim<'_> {
        let mut slots = self.slots.lock();
        loop {
            let pending = match slots.entries.get(key) {
                Some(Slot::Ready(hits)) => return Claim::Ready(hits.clone()),
                Some(Slot::Pending) => true,
                None => false,
            };
            if !pending {
                slots.entries.insert(key.clone(), Slot::Pending);
                return Claim::Reserved(Reservation { table: self, key: key.clone(), resolved: false });
            }
            self.resolved.wait(&mut slots);
        }
    }

    fn get(&self, key: &SlotKey) -> Option<Vec<SearchHit>> {
        match self.slots.lock().entries.get(key) {
            Some(Slot::Ready(hits)) => Some(hits.clone()),
            _ => None,
        }
    }

    fn snapshot(&self) -> Vec<(String, Vec<SearchHit>)> {
        let slots = self.slots.lock();
        slots
            .order
            .iter()
            .filter_map(|key| match slots.entries.get(key) {
                Some(Slot::Ready(hits)) => Some((key.0.clone(), hits.clone())),
                _ => None,
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.slots.lock().order.len()
    }
}

/// Exclusive right to resolve one key. Dropping it unresolved, for example
/// when the search panics, frees the key for the next caller.
struct Reservation<'a> {
    table: &'a ResultTable,
    key: SlotKey,
    resolved: bool,
}

impl Reservation<'_> {
    fn resolve(mut self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let table = self.table;
        let mut slots = table.slots.lock();
        slots.entries.insert(self.key.clone(), Slot::Ready(hits.clone()));
        slots.order.push(self.key.clone());
        self.resolved = true;
        table.resolved.notify_all();
        hits
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.table.slots.lock().entries.remove(&self.key);
            self.table.resolved.notify_all();
        }
    }
}

/// Answers query lines against a searcher, dispatching through a work queue.
///
/// A queue with one worker gives the single-threaded behavior. Each canonical
/// key is searched at most once per mode, no matter how often it appears or how
/// many tasks race on it. Results are kept in the order keys were first resolved.
pub struct QueryEngine<S: Searcher = SharedIndex> {
    searcher: Arc<S>,
    queue: Arc<WorkQueue>,
    table: Arc<ResultTable>,
}

impl<S: Searcher> QueryEngine<S> {
    pub fn new(searcher: Arc<S>, queue: Arc<WorkQueue>) -> Self {
        Self { searcher, queue, table: Arc::new(ResultTable::default()) }
    }

    /// Reads `query_file` on the calling thread, submits one task per line and
    /// waits for all of them. Returns the number of lines read.
    pub fn run_queries(&self, query_file: &Path, exact: bool) -> Result<usize> {
        if !query_file.is_file() {
            return Err(Error::MissingInput(format!("query file {} not found", query_file.display())));
        }
        let file = File::open(query_file).map_err(|e| Error::io(query_file, e))?;

        let submitted = self.submit_lines(BufReader::new(file), query_file, exact);
        // tasks already queued must finish even if submission stopped early
        self.queue.finish();
        let submitted = submitted?;
        info!(file = %query_file.display(), lines = submitted, queries = self.len(), "queries resolved");
        Ok(submitted)
    }

    /// Lines are decoded lossily, so stray bytes never cost the rest of the file.
    /// A read failure is logged and ends the input; queued lines still run.
    fn submit_lines<R: BufRead>(&self, mut reader: R, query_file: &Path, exact: bool) -> Result<usize> {
        let mut submitted = 0;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(file = %query_file.display(), error = %err, "unable to read query file");
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf).trim_end_matches(['\n', '\r']).to_string();
            let searcher = Arc::clone(&self.searcher);
            let table = Arc::clone(&self.table);
            self.queue.execute(move || resolve_line(searcher.as_ref(), &table, &line, exact))?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Resolves one line on the calling thread, sharing the memoized table.
    /// Lines without any terms give no results and are not recorded.
    pub fn search_line(&self, line: &str, exact: bool) -> Vec<SearchHit> {
        let terms = unique_stems(line);
        if terms.is_empty() {
            return Vec::new();
        }
        let key = (query_key(&terms), exact);
        match self.table.claim(&key) {
            Claim::Ready(hits) => hits,
            Claim::Reserved(reservation) => reservation.resolve(self.searcher.search(&terms, exact)),
        }
    }

    /// Cached results for a canonical key.
    pub fn get(&self, key: &str, exact: bool) -> Option<Vec<SearchHit>> {
        self.table.get(&(key.to_string(), exact))
    }

    /// (key, results) pairs in first-resolution order.
    pub fn results(&self) -> Vec<(String, Vec<SearchHit>)> {
        self.table.snapshot()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_results(&self, path: &Path) -> Result<()> {
        output::write_results_json(&self.results(), path)
    }

    pub fn results_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        output::results_to_writer(&self.results(), writer)
    }
}

fn resolve_line<S: Searcher>(searcher: &S, table: &ResultTable, line: &str, exact: bool) {
    let terms = unique_stems(line);
    if terms.is_empty() {
        return;
    }
    let key = (query_key(&terms), exact);
    let Some(reservation) = table.reserve(&key) else {
        debug!(query = %key.0, "query already resolved");
        return;
    };
    let hits = searcher.search(&terms, exact);
    debug!(query = %key.0, hits = hits.len(), "resolved query");
    reservation.resolve(hits);
}
