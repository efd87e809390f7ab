//! vecsearch vector index
//!
//! Corpus embedding, exact cosine top-k search, snapshot persistence and the
//! lifecycle manager that owns the single published index.

pub mod builder;
pub mod corpus;
pub mod lifecycle;
pub mod persistence;
pub mod similarity;
pub mod types;
pub mod vector_index;

pub use builder::{build_index, composite_text};
pub use corpus::{CorpusStore, JsonCorpusStore, MemoryCorpusStore};
pub use lifecycle::{IndexManager, IndexState, IndexStatus};
pub use types::{IndexSnapshot, MetadataEntry, Record, SearchResult, SimilarRecord};
pub use vector_index::VectorIndex;
