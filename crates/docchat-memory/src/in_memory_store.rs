use crate::mmr::{MmrCandidate, MmrConfig, dot, mmr_rerank};
use crate::vector_store::{ScoredVectorPoint, VectorPoint, VectorStoreError};

struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    chunk: crate::document::Chunk,
}

/// Immutable flat index built once per processed file set.
///
/// Vectors are L2-normalized on insert, so similarity is a dot product.
pub struct InMemoryVectorStore {
    points: Vec<StoredPoint>,
    dimension: usize,
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("len", &self.points.len())
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Scale `v` to unit length in place; zero vectors stay zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

impl InMemoryVectorStore {
    /// Build the index in one pass.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::EmptyIndex`] for an empty input and
    /// [`VectorStoreError::DimensionMismatch`] when vectors differ in length.
    pub fn from_points(points: Vec<VectorPoint>) -> Result<Self, VectorStoreError> {
        let dimension = points
            .first()
            .map(|p| p.vector.len())
            .ok_or(VectorStoreError::EmptyIndex)?;

        let mut stored = Vec::with_capacity(points.len());
        for p in points {
            if p.vector.len() != dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dimension,
                    actual: p.vector.len(),
                });
            }
            let mut vector = p.vector;
            l2_normalize(&mut vector);
            stored.push(StoredPoint {
                id: p.id,
                vector,
                chunk: p.chunk,
            });
        }

        Ok(Self {
            points: stored,
            dimension,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn normalized_query(&self, query: &[f32]) -> Result<Vec<f32>, VectorStoreError> {
        if query.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut q = query.to_vec();
        l2_normalize(&mut q);
        Ok(q)
    }

    /// Positions and scores of the `limit` most similar points; ties keep insertion order
    /// and NaN scores rank last.
    fn ranked(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, dot(query, &p.vector)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.is_nan()
                .cmp(&b.1.is_nan())
                .then_with(|| b.1.total_cmp(&a.1))
        });
        scored.truncate(limit);
        scored
    }

    fn scored(&self, idx: usize, score: f32) -> ScoredVectorPoint {
        let p = &self.points[idx];
        ScoredVectorPoint {
            id: p.id.clone(),
            score,
            chunk: p.chunk.clone(),
        }
    }

    /// Plain top-`limit` cosine similarity search.
    ///
    /// # Errors
    ///
    /// Returns an error if the query dimension differs from the index.
    pub fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredVectorPoint>, VectorStoreError> {
        let q = self.normalized_query(query)?;
        Ok(self
            .ranked(&q, limit)
            .into_iter()
            .map(|(i, s)| self.scored(i, s))
            .collect())
    }

    /// Fetch `fetch_k` candidates by similarity, then re-rank `k` of them with MMR.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero `k`, a `fetch_k` below `k`, or a dimension mismatch.
    pub fn search_mmr(
        &self,
        query: &[f32],
        config: &MmrConfig,
    ) -> Result<Vec<ScoredVectorPoint>, VectorStoreError> {
        if config.k == 0 {
            return Err(VectorStoreError::InvalidQuery("k must be positive".into()));
        }
        if config.fetch_k < config.k {
            return Err(VectorStoreError::InvalidQuery(format!(
                "fetch_k ({}) must be at least k ({})",
                config.fetch_k, config.k
            )));
        }
        let q = self.normalized_query(query)?;
        let ranked = self.ranked(&q, config.fetch_k);
        let candidates: Vec<MmrCandidate<'_>> = ranked
            .iter()
            .map(|&(i, score)| MmrCandidate {
                score,
                vector: &self.points[i].vector,
            })
            .collect();

        let picked = mmr_rerank(&candidates, config.k, config.lambda);
        tracing::debug!(
            candidates = candidates.len(),
            picked = ?picked.iter().map(|&p| ranked[p].1).collect::<Vec<_>>(),
            "mmr retrieval scores"
        );
        Ok(picked
            .into_iter()
            .map(|p| {
                let (i, s) = ranked[p];
                self.scored(i, s)
            })
            .collect())
    }
}
