use crate::document::Chunk;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("cannot build an index from zero chunks")]
    EmptyIndex,
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// A chunk and its embedding, as handed to the index builder.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    /// Cosine similarity to the query.
    pub score: f32,
    pub chunk: Chunk,
}
