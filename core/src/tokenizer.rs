use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NON_LETTER: Regex = Regex::new(r"[^\p{L}\s]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Splits text into lowercase words using NFD normalization. Anything that is
/// not a letter or whitespace is dropped, so "don't" becomes "dont" and
/// accents fall away.
pub fn clean(text: &str) -> Vec<String> {
    let decomposed = text.nfd().collect::<String>();
    NON_LETTER
        .replace_all(&decomposed, "")
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Cleaned and stemmed words of one line, in order.
pub fn stem_line(line: &str) -> Vec<String> {
    clean(line)
        .iter()
        .map(|word| STEMMER.stem(word).into_owned())
        .filter(|stem| !stem.is_empty())
        .collect()
}

/// Distinct stems of one line, sorted.
pub fn unique_stems(line: &str) -> BTreeSet<String> {
    stem_line(line).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_stem() {
        let words = stem_line("Running, runner's run!");
        assert_eq!(words.len(), 3);
        assert!(words.iter().any(|w| w == "run"));
    }

    #[test]
    fn strips_punctuation_and_digits() {
        assert_eq!(clean("Hello, World! 42 e-mail"), vec!["hello", "world", "email"]);
        assert!(clean("  \t 123 ... ").is_empty());
    }
}
