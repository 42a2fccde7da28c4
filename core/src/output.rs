//! Pretty JSON output for the index, its word counts and search results.
//!
//! Everything is tab indented. Index and location maps are ordered, so keys
//! come out sorted; result lists keep the order they are given in.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::index::InvertedIndex;
use crate::ranking::SearchHit;
use crate::{Error, Result};

pub const DEFAULT_INDEX_PATH: &str = "index.json";
pub const DEFAULT_LOCATIONS_PATH: &str = "locations.json";
pub const DEFAULT_RESULTS_PATH: &str = "results.json";

#[derive(Serialize)]
struct QueryRecord<'a> {
    queries: &'a str,
    results: &'a [SearchHit],
}

fn pretty<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    let mut ser = serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut ser)?;
    Ok(())
}

fn to_file(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.write_all(b"\n").map_err(|e| Error::io(path, e))?;
    writer.flush().map_err(|e| Error::io(path, e))
}

pub fn index_to_writer<W: Write>(index: &InvertedIndex, writer: W) -> Result<()> {
    pretty(writer, index.word_map())
}

pub fn locations_to_writer<W: Write>(index: &InvertedIndex, writer: W) -> Result<()> {
    pretty(writer, index.locations())
}

pub fn results_to_writer<W: Write>(results: &[(String, Vec<SearchHit>)], writer: W) -> Result<()> {
    let records: Vec<QueryRecord<'_>> = results
        .iter()
        .map(|(queries, hits)| QueryRecord { queries, results: hits })
        .collect();
    pretty(writer, &records)
}

pub fn write_index_json(index: &InvertedIndex, path: &Path) -> Result<()> {
    to_file(path, |w| index_to_writer(index, w))
}

pub fn write_locations_json(index: &InvertedIndex, path: &Path) -> Result<()> {
    to_file(path, |w| locations_to_writer(index, w))
}

pub fn write_results_json(results: &[(String, Vec<SearchHit>)], path: &Path) -> Result<()> {
    to_file(path, |w| results_to_writer(results, w))
}
