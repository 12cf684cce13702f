//! Exact (flat) cosine similarity index.
//!
//! Every query is scored against every stored vector; there is no
//! approximation. Stored vectors are unit length, so cosine similarity is a
//! plain dot product. Scoring runs in parallel across stored vectors.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use rxnsim_core::error::{Result, SimError};

use crate::store::{dot, normalize_query, VectorStore};

/// A single hit returned from a similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier of the matching stored vector.
    pub id: usize,
    /// Cosine similarity to the query, in [-1.0, 1.0].
    pub score: f32,
}

/// Read-only flat index over a normalized [`VectorStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityIndex {
    store: VectorStore,
}

impl SimilarityIndex {
    /// Build an index over a normalized copy of `store`.
    ///
    /// A raw store is normalized first, which fails with `DegenerateVector`
    /// if it holds a zero vector.
    pub fn build(store: &VectorStore) -> Result<Self> {
        Ok(Self {
            store: store.normalize()?,
        })
    }

    /// Return the `k` stored vectors most similar to `query`.
    ///
    /// The query is normalized before scoring. Results are ordered by
    /// descending score, ties broken by ascending id. If `k` exceeds the
    /// index size, every stored vector is returned.
    pub fn search(&self, query: &[f32], k: i64) -> Result<Vec<SearchHit>> {
        let k = validate_k(k)?;
        let query = normalize_query(query, self.dimension())?;
        Ok(self.rank(&query, k))
    }

    /// Search using the stored vector `id` as the query.
    ///
    /// The stored vector ranks itself first (score 1.0 up to rounding)
    /// unless another stored vector is identical to it and has a lower id.
    pub fn search_by_id(&self, id: usize, k: i64) -> Result<Vec<SearchHit>> {
        let k = validate_k(k)?;
        let query = self.store.get(id)?;
        Ok(self.rank(query, k))
    }

    /// Run [`search`](Self::search) for each query, returning one ranked
    /// list per query in input order.
    pub fn search_batch<Q: AsRef<[f32]>>(
        &self,
        queries: &[Q],
        k: i64,
    ) -> Result<Vec<Vec<SearchHit>>> {
        queries.iter().map(|q| self.search(q.as_ref(), k)).collect()
    }

    /// The normalized vectors this index scores against.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn into_store(self) -> VectorStore {
        self.store
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub(crate) fn from_normalized(store: VectorStore) -> Self {
        debug_assert!(store.is_normalized());
        Self { store }
    }

    fn rank(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .store
            .as_flat()
            .par_chunks_exact(self.dimension())
            .enumerate()
            .map(|(id, row)| SearchHit {
                id,
                score: dot(query, row),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, rank_order);
            hits.truncate(k);
        }
        hits.sort_unstable_by(rank_order);
        hits
    }
}

/// Descending score, then ascending id.
fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}

fn validate_k(k: i64) -> Result<usize> {
    if k <= 0 {
        return Err(SimError::InvalidK(k));
    }
    Ok(usize::try_from(k).unwrap_or(usize::MAX))
}
