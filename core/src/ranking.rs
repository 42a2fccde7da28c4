use std::cmp::Ordering;

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

/// One document's match summary for a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(rename = "where")]
    location: String,
    count: usize,
    #[serde(serialize_with = "six_places")]
    score: f64,
    #[serde(skip)]
    total_words: usize,
}

impl SearchHit {
    pub fn new(location: impl Into<String>, total_words: usize, count: usize) -> Self {
        Self { location: location.into(), count, score: score(count, total_words), total_words }
    }

    /// Adds matches from another term and recomputes the score.
    pub fn add_matches(&mut self, count: usize) {
        self.count += count;
        self.score = score(self.count, self.total_words);
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn total_words(&self) -> usize {
        self.total_words
    }
}

fn score(count: usize, total_words: usize) -> f64 {
    if total_words == 0 {
        0.0
    } else {
        count as f64 / total_words as f64
    }
}

fn six_places<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let raw = RawValue::from_string(format!("{score:.6}")).map_err(serde::ser::Error::custom)?;
    raw.serialize(serializer)
}

/// Ranking order: score descending, then count descending, then location
/// ascending ignoring case. Exact location breaks the last tie so the order
/// is total.
impl Ord for SearchHit {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| {
                self.location
                    .to_lowercase()
                    .cmp(&other.location.to_lowercase())
            })
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl PartialOrd for SearchHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SearchHit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchHit {}
