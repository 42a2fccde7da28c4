use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::index::SharedIndex;
use crate::pool::WorkQueue;
use crate::query::QueryEngine;
use crate::Result;

/// Outputs and queries to run once an index has been populated.
#[derive(Debug, Default, Clone)]
pub struct Report {
    pub index: Option<PathBuf>,
    pub locations: Option<PathBuf>,
    pub queries: Option<PathBuf>,
    pub exact: bool,
    pub results: Option<PathBuf>,
}

impl Report {
    /// Writes the requested JSON files, then answers the query file through
    /// `queue`. A results path without a query file writes an empty list.
    pub fn run(&self, index: &Arc<SharedIndex>, queue: &Arc<WorkQueue>) -> Result<()> {
        if let Some(path) = &self.index {
            index.write_index_json(path)?;
            info!(path = %path.display(), "wrote index");
        }
        if let Some(path) = &self.locations {
            index.write_locations_json(path)?;
            info!(path = %path.display(), "wrote locations");
        }

        let engine = QueryEngine::new(Arc::clone(index), Arc::clone(queue));
        if let Some(path) = &self.queries {
            engine.run_queries(path, self.exact)?;
        }
        if let Some(path) = &self.results {
            engine.write_results(path)?;
            info!(path = %path.display(), queries = engine.len(), "wrote results");
        }
        Ok(())
    }
}
