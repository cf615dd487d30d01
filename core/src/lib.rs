//! Indexing core of the search engine: persistent lexicon, document index,
//! inverted index and link graph, plus PageRank and the query contract used
//! by the serving layer.

pub mod cache;
pub mod error;
pub mod pagerank;
pub mod query;
pub mod resolve;
pub mod store;
pub mod tokenizer;

pub use cache::IdCache;
pub use error::{StorageError, StorageResult};
pub use pagerank::{PageRankConfig, PageRankOutcome};
pub use query::{Page, SearchHit, SearchResults};
pub use resolve::ResolvedIndex;
pub use store::{DocMeta, Store, StoreStats};

pub type WordId = u64;
pub type DocId = u64;
