use docchat_llm::provider::EmbedFn;
use serde::Serialize;

use super::{Document, DocumentError, TextSplitter};
use crate::in_memory_store::InMemoryVectorStore;
use crate::vector_store::{VectorPoint, VectorStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestionStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Split -> embed -> index, producing a fresh index for one processed file set.
pub struct IngestionPipeline {
    splitter: TextSplitter,
    embed_fn: EmbedFn,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(splitter: TextSplitter, embed_fn: EmbedFn) -> Self {
        Self { splitter, embed_fn }
    }

    /// # Errors
    ///
    /// Returns an error if embedding fails or no chunk could be produced.
    pub async fn build_index(
        &self,
        documents: &[Document],
    ) -> Result<(InMemoryVectorStore, IngestionStats), DocumentError> {
        let chunks = self.splitter.split_documents(documents);
        tracing::info!(chunks = chunks.len(), "text chunk processing complete");
        if chunks.is_empty() {
            return Err(VectorStoreError::EmptyIndex.into());
        }

        let mut points = Vec::with_capacity(chunks.len());
        for (n, chunk) in chunks.into_iter().enumerate() {
            let vector = (self.embed_fn)(&chunk.content).await?;
            points.push(VectorPoint {
                id: format!("chunk-{n}"),
                vector,
                chunk,
            });
        }

        let stats = IngestionStats {
            documents: documents.len(),
            chunks: points.len(),
        };
        let store = InMemoryVectorStore::from_points(points)?;
        tracing::info!(
            chunks = stats.chunks,
            dimension = store.dimension(),
            "vector store processing complete"
        );
        Ok((store, stats))
    }
}
