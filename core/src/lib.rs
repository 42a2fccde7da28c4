pub mod builder;
pub mod error;
pub mod index;
pub mod output;
pub mod pool;
pub mod query;
pub mod ranking;
pub mod report;
pub mod rwlock;
pub mod tokenizer;

pub use error::{Error, Result};
pub use index::{InvertedIndex, SharedIndex};
pub use pool::WorkQueue;
pub use query::{QueryEngine, Searcher};
pub use ranking::SearchHit;
pub use report::Report;
pub use rwlock::ReadWriteLock;
