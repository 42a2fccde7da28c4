use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::ops::Bound;
use std::path::Path;

use crate::output;
use crate::ranking::SearchHit;
use crate::rwlock::ReadWriteLock;
use crate::Result;

/// Positions of one word inside one document, 1-based and ascending.
pub type Positions = BTreeSet<usize>;

/// word -> document -> positions, plus document -> total word count.
///
/// Both maps are ordered so prefix scans and JSON output walk keys in sorted order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvertedIndex {
    words: BTreeMap<String, BTreeMap<String, Positions>>,
    locations: BTreeMap<String, usize>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `word` at `position` in `location`. Returns false if the position
    /// was already present; the document's word count only grows on new positions.
    pub fn put(&mut self, word: impl Into<String>, location: &str, position: usize) -> bool {
        let added = self
            .words
            .entry(word.into())
            .or_default()
            .entry(location.to_string())
            .or_default()
            .insert(position);
        if added {
            *self.locations.entry(location.to_string()).or_insert(0) += 1;
        }
        added
    }

    /// Folds an independently built index into this one.
    ///
    /// Position sets are unioned; pairs new to this index adopt `other`'s set
    /// as is. Word counts grow by the number of positions that were actually new,
    /// so merging the same content twice changes nothing.
    pub fn add_all(&mut self, other: InvertedIndex) {
        for (word, postings) in other.words {
            let mine = self.words.entry(word).or_default();
            for (location, positions) in postings {
                let added = match mine.get_mut(&location) {
                    Some(existing) => {
                        let before = existing.len();
                        existing.extend(positions);
                        existing.len() - before
                    }
                    None => {
                        let added = positions.len();
                        mine.insert(location.clone(), positions);
                        added
                    }
                };
                if added > 0 {
                    *self.locations.entry(location).or_insert(0) += added;
                }
            }
        }
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.keys().map(String::as_str)
    }

    pub fn documents<'a>(&'a self, word: &str) -> impl Iterator<Item = &'a str> {
        self.words.get(word).into_iter().flat_map(|postings| postings.keys().map(String::as_str))
    }

    pub fn positions(&self, word: &str, location: &str) -> Option<&Positions> {
        self.words.get(word)?.get(location)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    pub fn contains_document(&self, word: &str, location: &str) -> bool {
        self.positions(word, location).is_some()
    }

    pub fn contains_position(&self, word: &str, location: &str, position: usize) -> bool {
        self.positions(word, location).is_some_and(|p| p.contains(&position))
    }

    /// Total words recorded for `location`, or 0 if it was never indexed.
    pub fn total_words(&self, location: &str) -> usize {
        self.locations.get(location).copied().unwrap_or(0)
    }

    pub fn locations(&self) -> &BTreeMap<String, usize> {
        &self.locations
    }

    pub(crate) fn word_map(&self) -> &BTreeMap<String, BTreeMap<String, Positions>> {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Ranks documents containing any of `terms` exactly.
    pub fn exact_search(&self, terms: &BTreeSet<String>) -> Vec<SearchHit> {
        let mut hits = HashMap::new();
        for term in terms {
            if let Some(postings) = self.words.get(term) {
                self.accumulate(postings, &mut hits);
            }
        }
        rank(hits)
    }

    /// Ranks documents containing any word that starts with one of `terms`.
    pub fn partial_search(&self, terms: &BTreeSet<String>) -> Vec<SearchHit> {
        let mut hits = HashMap::new();
        for term in terms {
            // prefix matches are contiguous from the first key >= term
            let tail = self.words.range::<str, _>((Bound::Included(term.as_str()), Bound::Unbounded));
            for (word, postings) in tail {
                if !word.starts_with(term.as_str()) {
                    break;
                }
                self.accumulate(postings, &mut hits);
            }
        }
        rank(hits)
    }

    pub fn search(&self, terms: &BTreeSet<String>, exact: bool) -> Vec<SearchHit> {
        if exact {
            self.exact_search(terms)
        } else {
            self.partial_search(terms)
        }
    }

    fn accumulate<'a>(
        &'a self,
        postings: &'a BTreeMap<String, Positions>,
        hits: &mut HashMap<&'a str, SearchHit>,
    ) {
        for (location, positions) in postings {
            hits.entry(location.as_str())
                .and_modify(|hit| hit.add_matches(positions.len()))
                .or_insert_with(|| SearchHit::new(location.as_str(), self.total_words(location), positions.len()));
        }
    }
}

fn rank(hits: HashMap<&str, SearchHit>) -> Vec<SearchHit> {
    let mut ranked: Vec<SearchHit> = hits.into_values().collect();
    ranked.sort();
    ranked
}

/// Thread-safe index: lookups and serialization take the read lock, `put` and
/// `add_all` take the write lock.
#[derive(Debug, Default)]
pub struct SharedIndex {
    inner: ReadWriteLock<InvertedIndex>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, word: impl Into<String>, location: &str, position: usize) -> bool {
        self.inner.lock_write().put(word, location, position)
    }

    /// The single write path for pipelines that build a local index without
    /// locking and merge it in one step.
    pub fn add_all(&self, other: InvertedIndex) {
        self.inner.lock_write().add_all(other);
    }

    pub fn exact_search(&self, terms: &BTreeSet<String>) -> Vec<SearchHit> {
        self.inner.lock_read().exact_search(terms)
    }

    pub fn partial_search(&self, terms: &BTreeSet<String>) -> Vec<SearchHit> {
        self.inner.lock_read().partial_search(terms)
    }

    pub fn search(&self, terms: &BTreeSet<String>, exact: bool) -> Vec<SearchHit> {
        self.inner.lock_read().search(terms, exact)
    }

    pub fn words(&self) -> Vec<String> {
        self.inner.lock_read().words().map(str::to_string).collect()
    }

    pub fn documents(&self, word: &str) -> Vec<String> {
        self.inner.lock_read().documents(word).map(str::to_string).collect()
    }

    pub fn positions(&self, word: &str, location: &str) -> Option<Positions> {
        self.inner.lock_read().positions(word, location).cloned()
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.inner.lock_read().contains_word(word)
    }

    pub fn contains_document(&self, word: &str, location: &str) -> bool {
        self.inner.lock_read().contains_document(word, location)
    }

    pub fn contains_position(&self, word: &str, location: &str, position: usize) -> bool {
        self.inner.lock_read().contains_position(word, location, position)
    }

    pub fn total_words(&self, location: &str) -> usize {
        self.inner.lock_read().total_words(location)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock_read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock_read().len()
    }

    pub fn snapshot(&self) -> InvertedIndex {
        self.inner.lock_read().clone()
    }

    pub fn write_index_json(&self, path: &Path) -> Result<()> {
        output::write_index_json(&self.inner.lock_read(), path)
    }

    pub fn write_locations_json(&self, path: &Path) -> Result<()> {
        output::write_locations_json(&self.inner.lock_read(), path)
    }

    pub fn index_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        output::index_to_writer(&self.inner.lock_read(), writer)
    }

    pub fn locations_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        output::locations_to_writer(&self.inner.lock_read(), writer)
    }
}

impl From<InvertedIndex> for SharedIndex {
    fn from(index: InvertedIndex) -> Self {
        Self { inner: ReadWriteLock::new(index) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn sample() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        for (pos, word) in ["appl", "banana", "appl", "applic"].iter().enumerate() {
            index.put(*word, "a.txt", pos + 1);
        }
        for (pos, word) in ["banana", "cherri"].iter().enumerate() {
            index.put(*word, "b.txt", pos + 1);
        }
        index
    }

    #[test]
    fn put_is_idempotent() {
        let mut index = InvertedIndex::new();
        assert!(index.put("hello", "a.txt", 1));
        assert!(!index.put("hello", "a.txt", 1));
        assert!(index.put("world", "a.txt", 2));
        assert_eq!(index.total_words("a.txt"), 2);
        assert_eq!(index.total_words("missing.txt"), 0);
        assert!(index.contains_position("hello", "a.txt", 1));
        assert!(!index.contains_position("hello", "a.txt", 2));
    }

    #[test]
    fn exact_search_counts_positions() {
        let index = sample();
        let hits = index.exact_search(&terms(&["appl", "banana"]));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].location(), "a.txt");
        assert_eq!(hits[0].count(), 3);
        assert_eq!(hits[0].score(), 0.75);
        assert_eq!(hits[1].location(), "b.txt");
        assert_eq!(hits[1].count(), 1);
        assert_eq!(hits[1].score(), 0.5);
        for hit in &hits {
            assert!(hit.count() <= hit.total_words());
        }
    }

    #[test]
    fn partial_search_scans_only_the_prefix_range() {
        let index = sample();
        let hits = index.partial_search(&terms(&["app"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].location(), "a.txt");
        assert_eq!(hits[0].count(), 3);

        assert!(index.partial_search(&terms(&["zzz"])).is_empty());
        assert!(index.exact_search(&terms(&["app"])).is_empty());
    }

    #[test]
    fn partial_matches_exact_when_not_a_strict_prefix() {
        let index = sample();
        let query = terms(&["cherri"]);
        let exact = index.exact_search(&query);
        let partial = index.partial_search(&query);
        assert_eq!(exact.len(), partial.len());
        for (e, p) in exact.iter().zip(&partial) {
            assert_eq!(e.location(), p.location());
            assert_eq!(e.count(), p.count());
        }
    }

    #[test]
    fn partial_is_a_superset_of_exact_for_a_strict_prefix() {
        let mut index = sample();
        index.put("applic", "c.txt", 1);
        index.put("other", "c.txt", 2);

        let query = terms(&["appl"]);
        let exact = index.exact_search(&query);
        let partial = index.partial_search(&query);

        let exact_docs: BTreeSet<&str> = exact.iter().map(SearchHit::location).collect();
        let partial_docs: BTreeSet<&str> = partial.iter().map(SearchHit::location).collect();
        assert_eq!(exact_docs, BTreeSet::from(["a.txt"]));
        assert_eq!(partial_docs, BTreeSet::from(["a.txt", "c.txt"]));

        // a.txt picks up the "applic" position on top of the two exact matches
        assert_eq!(exact[0].count(), 2);
        let a = partial.iter().find(|hit| hit.location() == "a.txt").unwrap();
        assert_eq!(a.count(), 3);
    }

    #[test]
    fn shared_put_is_idempotent_under_contention() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use std::thread;

        let shared = Arc::new(SharedIndex::new());
        let added = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let added = Arc::clone(&added);
                thread::spawn(move || {
                    for pos in 1..=100 {
                        if shared.put("word", "a.txt", pos) {
                            added.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(added.load(Ordering::SeqCst), 100);
        assert_eq!(shared.total_words("a.txt"), 100);
        assert_eq!(shared.positions("word", "a.txt").map(|p| p.len()), Some(100));
        assert!(!shared.put("word", "a.txt", 7));
        assert!(shared.put("word", "a.txt", 101));
        assert_eq!(shared.total_words("a.txt"), 101);
    }

    #[test]
    fn add_all_unions_positions() {
        let mut left = InvertedIndex::new();
        left.put("rust", "a.txt", 1);
        left.put("rust", "a.txt", 3);

        let mut right = InvertedIndex::new();
        right.put("rust", "a.txt", 3);
        right.put("rust", "a.txt", 5);
        right.put("go", "b.txt", 1);

        left.add_all(right.clone());
        let expected: Positions = [1, 3, 5].into_iter().collect();
        assert_eq!(left.positions("rust", "a.txt"), Some(&expected));
        assert_eq!(left.total_words("a.txt"), 3);
        assert_eq!(left.total_words("b.txt"), 1);

        let before = left.clone();
        left.add_all(right);
        assert_eq!(left, before);
    }

    #[test]
    fn merging_partials_matches_direct_build() {
        let corpus = [("a.txt", ["x", "y", "x"]), ("b.txt", ["y", "z", "z"])];

        let mut direct = InvertedIndex::new();
        let mut parts = Vec::new();
        for (location, words) in corpus {
            let mut part = InvertedIndex::new();
            for (i, word) in words.iter().enumerate() {
                direct.put(*word, location, i + 1);
                part.put(*word, location, i + 1);
            }
            parts.push(part);
        }

        let mut merged = InvertedIndex::new();
        for part in parts {
            merged.add_all(part);
        }
        assert_eq!(merged, direct);
    }

    #[test]
    fn shared_index_serves_concurrent_readers_and_writers() {
        use std::sync::Arc;
        use std::thread;

        let shared = Arc::new(SharedIndex::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let location = format!("doc{t}.txt");
                    for pos in 1..=50 {
                        let mut local = InvertedIndex::new();
                        local.put("word", &location, pos);
                        shared.add_all(local);
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..50 {
                        for hit in shared.exact_search(&terms(&["word"])) {
                            assert_eq!(hit.count(), hit.total_words());
                        }
                    }
                })
            })
            .collect();
        for h in writers.into_iter().chain(readers) {
            h.join().unwrap();
        }
        assert_eq!(shared.documents("word").len(), 4);
        assert_eq!(shared.total_words("doc2.txt"), 50);
    }
}
