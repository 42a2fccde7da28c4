//! Builds the shared index from a tree of text files, one stemming task per file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::index::{InvertedIndex, SharedIndex};
use crate::pool::WorkQueue;
use crate::tokenizer::stem_line;
use crate::{Error, Result};

pub const TEXT_EXTENSIONS: [&str; 2] = [".txt", ".text"];

/// Case-insensitive check on the file name suffix.
pub fn is_text_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .is_some_and(|name| TEXT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

/// Stems every line of `lines` into a fresh index keyed by `location`.
/// Positions run from 1 across the whole input, not per line.
pub fn stem_lines<I, S>(lines: I, location: &str) -> InvertedIndex
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut local = InvertedIndex::new();
    let mut position = 1;
    for line in lines {
        for word in stem_line(line.as_ref()) {
            local.put(word, location, position);
            position += 1;
        }
    }
    local
}

pub fn stem_text(text: &str, location: &str) -> InvertedIndex {
    stem_lines(text.lines(), location)
}

/// Reads and stems one file without touching any shared state.
pub fn stem_file(path: &Path) -> Result<InvertedIndex> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<String>>>()
        .map_err(|e| Error::io(path, e))?;
    Ok(stem_lines(lines, &path.to_string_lossy()))
}

/// Walks `root` on the calling thread and submits one task per text file. Each
/// task stems its file into a local index and merges it with `add_all`, so the
/// write lock is held only for the merge. Returns once every task is done.
pub fn build_index(root: &Path, index: &Arc<SharedIndex>, queue: &WorkQueue) -> Result<usize> {
    if !root.exists() {
        return Err(Error::MissingInput(format!("{} does not exist", root.display())));
    }

    let mut submitted = 0;
    // symlinked files and directories count; walkdir reports link loops as errors
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_text_file(entry.path()) {
            continue;
        }

        let path = entry.into_path();
        let index = Arc::clone(index);
        queue.execute(move || match stem_file(&path) {
            Ok(local) => {
                debug!(file = %path.display(), "stemmed file");
                index.add_all(local);
            }
            Err(err) => warn!(error = %err, "unable to stem file"),
        })?;
        submitted += 1;
    }

    queue.finish();
    info!(root = %root.display(), files = submitted, words = index.len(), "index build complete");
    Ok(submitted)
}
