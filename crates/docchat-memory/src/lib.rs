//! Document loading, chunking and the in-memory vector index used for retrieval.

pub mod document;
pub mod in_memory_store;
pub mod mmr;
pub mod vector_store;

pub use in_memory_store::InMemoryVectorStore;
pub use mmr::MmrConfig;
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStoreError};
