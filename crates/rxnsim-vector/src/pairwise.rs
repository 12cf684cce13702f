//! Pairwise cosine similarity over a normalized vector store.
//!
//! Three ways to get at the same numbers:
//! - [`PairwiseEngine::compute_full`] materializes the symmetric N x N matrix
//!   (O(N^2) memory);
//! - [`PairwiseEngine::compute_pairs`] computes only a requested block of
//!   rows x columns;
//! - [`PairwiseEngine::similarity`] computes one pair on demand.
//!
//! All three use the same dot product and fix self-similarity at exactly
//! 1.0, so a given (i, j) cell has the same bits whichever way it was
//! produced.

use std::borrow::Cow;
use std::collections::HashMap;

use rayon::prelude::*;

use rxnsim_core::error::{Result, SimError};

use crate::index::SimilarityIndex;
use crate::store::{dot, VectorStore};

/// Dense symmetric similarity matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Similarity of `i` and `j`, or `None` if either is out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.size || j >= self.size {
            return None;
        }
        Some(self.values[i * self.size + j])
    }

    /// Row `i` of the matrix.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.size {
            return None;
        }
        Some(&self.values[i * self.size..(i + 1) * self.size])
    }

    /// Iterate the unique off-diagonal entries `(i, j, score)` with `i < j`,
    /// row by row.
    pub fn upper_triangle_iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.size).flat_map(move |i| {
            ((i + 1)..self.size).map(move |j| (i, j, self.values[i * self.size + j]))
        })
    }

    /// Collect the `N * (N - 1) / 2` unique off-diagonal entries.
    pub fn upper_triangle(&self) -> Vec<(usize, usize, f32)> {
        let n = self.size;
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        pairs.extend(self.upper_triangle_iter());
        pairs
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.values
    }

    pub(crate) fn from_parts(size: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), size * size);
        Self { size, values }
    }
}

/// Similarities for the cross product of two identifier lists.
#[derive(Debug, Clone, PartialEq)]
pub struct PairBlock {
    rows: Vec<usize>,
    cols: Vec<usize>,
    row_pos: HashMap<usize, usize>,
    col_pos: HashMap<usize, usize>,
    values: Vec<f32>,
}

impl PairBlock {
    /// Similarity of `(i, j)` if `i` was requested as a row and `j` as a
    /// column.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        let r = *self.row_pos.get(&i)?;
        let c = *self.col_pos.get(&j)?;
        Some(self.values[r * self.cols.len() + c])
    }

    /// Row identifiers, in request order.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Column identifiers, in request order.
    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(i, j, score)` in row-major request order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(r, &i)| {
            self.cols
                .iter()
                .enumerate()
                .map(move |(c, &j)| (i, j, self.values[r * self.cols.len() + c]))
        })
    }
}

/// Computes cosine similarities between vectors of one normalized store.
#[derive(Debug, Clone)]
pub struct PairwiseEngine<'a> {
    store: Cow<'a, VectorStore>,
}

impl<'a> PairwiseEngine<'a> {
    /// Create an engine over `store`.
    ///
    /// A normalized store is borrowed; a raw store is normalized into an
    /// owned copy, which fails with `DegenerateVector` on a zero vector.
    pub fn new(store: &'a VectorStore) -> Result<Self> {
        let store = if store.is_normalized() {
            Cow::Borrowed(store)
        } else {
            Cow::Owned(store.normalize()?)
        };
        Ok(Self { store })
    }

    /// Create an engine over the vectors of an existing index.
    pub fn from_index(index: &'a SimilarityIndex) -> Self {
        Self {
            store: Cow::Borrowed(index.store()),
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Compute the full symmetric similarity matrix.
    ///
    /// Only the upper triangle is computed; it is mirrored into the lower
    /// triangle and the diagonal is fixed to 1.0.
    pub fn compute_full(&self) -> Result<SimilarityMatrix> {
        let n = self.store.size();
        if n == 0 {
            return Err(SimError::EmptyInput(
                "cannot compute a similarity matrix over zero vectors".to_string(),
            ));
        }

        let store = &*self.store;
        let mut values = vec![0.0f32; n * n];
        values
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(i, row)| {
                let vi = &store.as_flat()[i * store.dimension()..(i + 1) * store.dimension()];
                row[i] = 1.0;
                for (j, vj) in store.rows().enumerate().skip(i + 1) {
                    row[j] = dot(vi, vj);
                }
            });

        for i in 1..n {
            for j in 0..i {
                values[i * n + j] = values[j * n + i];
            }
        }

        Ok(SimilarityMatrix::from_parts(n, values))
    }

    /// Compute similarities for every `(i, j)` with `i` in `i_ids` and `j`
    /// in `j_ids`, without materializing the full matrix.
    ///
    /// Fails with `NotFound` if any identifier is outside the store.
    pub fn compute_pairs(&self, i_ids: &[usize], j_ids: &[usize]) -> Result<PairBlock> {
        let row_vecs = i_ids
            .iter()
            .map(|&i| self.store.get(i))
            .collect::<Result<Vec<_>>>()?;
        let col_vecs = j_ids
            .iter()
            .map(|&j| self.store.get(j))
            .collect::<Result<Vec<_>>>()?;

        let width = j_ids.len();
        let mut values = vec![0.0f32; i_ids.len() * width];
        if width > 0 {
            values
                .par_chunks_mut(width)
                .zip(i_ids.par_iter().zip(row_vecs.par_iter()))
                .for_each(|(out, (&i, vi))| {
                    for ((slot, &j), vj) in out.iter_mut().zip(j_ids).zip(&col_vecs) {
                        *slot = pair_score(i, vi, j, vj);
                    }
                });
        }

        Ok(PairBlock {
            rows: i_ids.to_vec(),
            cols: j_ids.to_vec(),
            row_pos: first_positions(i_ids),
            col_pos: first_positions(j_ids),
            values,
        })
    }

    /// Similarity of a single pair, computed on demand.
    pub fn similarity(&self, i: usize, j: usize) -> Result<f32> {
        let vi = self.store.get(i)?;
        let vj = self.store.get(j)?;
        Ok(pair_score(i, vi, j, vj))
    }
}

#[inline]
fn pair_score(i: usize, vi: &[f32], j: usize, vj: &[f32]) -> f32 {
    if i == j {
        1.0
    } else {
        dot(vi, vj)
    }
}

fn first_positions(ids: &[usize]) -> HashMap<usize, usize> {
    let mut positions = HashMap::with_capacity(ids.len());
    for (pos, &id) in ids.iter().enumerate() {
        positions.entry(id).or_insert(pos);
    }
    positions
}
