use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use search_core::{Error, InvertedIndex, QueryEngine, SearchHit, Searcher, SharedIndex, WorkQueue};
use tempfile::tempdir;

struct CountingSearcher {
    index: SharedIndex,
    calls: AtomicUsize,
}

impl Searcher for CountingSearcher {
    fn search(&self, terms: &BTreeSet<String>, exact: bool) -> Vec<SearchHit> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.index.search(terms, exact)
    }
}

fn corpus() -> SharedIndex {
    let mut index = InvertedIndex::new();
    let docs = [
        ("a.txt", "apple banana apple cherry"),
        ("B.txt", "banana banana apricot"),
        ("c.txt", "cherry pie with apple"),
    ];
    for (location, text) in docs {
        index.add_all(search_core::builder::stem_text(text, location));
    }
    SharedIndex::from(index)
}

fn counting() -> Arc<CountingSearcher> {
    Arc::new(CountingSearcher { index: corpus(), calls: AtomicUsize::new(0) })
}

#[test]
fn duplicate_lines_are_searched_once() {
    let dir = tempdir().unwrap();
    let queries = dir.path().join("queries.txt");
    let mut lines = String::new();
    for _ in 0..40 {
        lines.push_str("apple banana\nBanana, APPLES!\n");
    }
    fs::write(&queries, lines).unwrap();

    let searcher = counting();
    let engine = QueryEngine::new(Arc::clone(&searcher), Arc::new(WorkQueue::new(8).unwrap()));
    assert_eq!(engine.run_queries(&queries, true).unwrap(), 80);

    assert_eq!(searcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.len(), 1);
    let results = engine.results();
    assert_eq!(results[0].0, "appl banana");
}

#[test]
fn results_follow_ranking_order() {
    let dir = tempdir().unwrap();
    let queries = dir.path().join("queries.txt");
    fs::write(&queries, "banana\n").unwrap();

    let engine = QueryEngine::new(Arc::new(corpus()), Arc::new(WorkQueue::new(2).unwrap()));
    engine.run_queries(&queries, true).unwrap();

    let hits = engine.get("banana", true).unwrap();
    let order: Vec<_> = hits.iter().map(|h| (h.location(), h.count())).collect();
    // B.txt: 2/3, a.txt: 1/4
    assert_eq!(order, vec![("B.txt", 2), ("a.txt", 1)]);
}

#[test]
fn partial_search_matches_prefixes() {
    let dir = tempdir().unwrap();
    let queries = dir.path().join("queries.txt");
    fs::write(&queries, "ap\n").unwrap();

    let engine = QueryEngine::new(Arc::new(corpus()), Arc::new(WorkQueue::new(2).unwrap()));
    engine.run_queries(&queries, false).unwrap();
    let hits = engine.get("ap", false).unwrap();
    let locations: BTreeSet<_> = hits.iter().map(|h| h.location().to_string()).collect();
    assert_eq!(locations.len(), 3);
    assert!(engine.get("ap", true).is_none());
}

#[test]
fn blank_and_symbol_lines_are_not_recorded() {
    let dir = tempdir().unwrap();
    let queries = dir.path().join("queries.txt");
    fs::write(&queries, "\n   \n!!! 123\ncherry\n").unwrap();

    let engine = QueryEngine::new(Arc::new(corpus()), Arc::new(WorkQueue::new(3).unwrap()));
    assert_eq!(engine.run_queries(&queries, true).unwrap(), 4);
    assert_eq!(engine.len(), 1);

    let mut out = Vec::new();
    engine.results_to_writer(&mut out).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["queries"], "cherri");
}

#[test]
fn single_worker_keeps_first_resolution_order() {
    let dir = tempdir().unwrap();
    let queries = dir.path().join("queries.txt");
    fs::write(&queries, "cherry\napple\ncherry\nbanana\n").unwrap();

    let engine = QueryEngine::new(Arc::new(corpus()), Arc::new(WorkQueue::new(1).unwrap()));
    engine.run_queries(&queries, true).unwrap();
    let keys: Vec<_> = engine.results().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["cherri", "appl", "banana"]);
}

#[test]
fn search_line_shares_the_memo() {
    let searcher = counting();
    let engine = QueryEngine::new(Arc::clone(&searcher), Arc::new(WorkQueue::new(1).unwrap()));
    let first = engine.search_line("Apples and cherries", true);
    let second = engine.search_line("cherry apple and", true);
    assert_eq!(searcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.len(), second.len());
    assert!(engine.search_line("...", true).is_empty());
}

#[test]
fn invalid_utf8_line_does_not_drop_the_rest() {
    let dir = tempdir().unwrap();
    let queries = dir.path().join("queries.txt");
    fs::write(&queries, b"apple\n\xff\xfe bad\nbanana\ncherry\n").unwrap();

    let engine = QueryEngine::new(Arc::new(corpus()), Arc::new(WorkQueue::new(2).unwrap()));
    assert_eq!(engine.run_queries(&queries, true).unwrap(), 4);

    for key in ["appl", "banana", "cherri"] {
        assert!(engine.get(key, true).is_some(), "{key} was not resolved");
    }
    assert_eq!(engine.get("banana", true).unwrap().len(), 2);
}

#[test]
fn missing_query_file_is_reported() {
    let dir = tempdir().unwrap();
    let engine = QueryEngine::new(Arc::new(corpus()), Arc::new(WorkQueue::new(1).unwrap()));
    let err = engine.run_queries(&dir.path().join("missing.txt"), true).unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));
}
