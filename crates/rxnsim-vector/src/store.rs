//! Dense, immutable vector store.
//!
//! Vectors are kept in one contiguous row-major buffer; identifier `i`
//! addresses row `i`. A store is validated once at construction (non-empty,
//! consistent dimension, finite components) and never mutated afterwards.
//! Normalization produces a new store.

use rxnsim_core::error::{Result, SimError, VectorRef};

/// Collection of equal-length `f32` vectors addressed by dense identifiers
/// `0..size()` in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    dimension: usize,
    data: Vec<f32>,
    normalized: bool,
}

impl VectorStore {
    /// Build a store from a sequence of vectors.
    ///
    /// Fails with `EmptyInput` if the sequence is empty or the vectors have
    /// no components, `DimensionMismatch` if a vector's length differs from
    /// the first one, and `InvalidVector` on NaN or infinite components.
    pub fn build<I, V>(vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[f32]>,
    {
        let mut iter = vectors.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| SimError::EmptyInput("no vectors supplied".to_string()))?;
        let first = first.as_ref();
        let dimension = first.len();
        if dimension == 0 {
            return Err(SimError::EmptyInput(
                "vectors have zero components".to_string(),
            ));
        }

        let (lower, _) = iter.size_hint();
        let mut data = Vec::with_capacity((lower + 1) * dimension);
        check_finite(first, VectorRef::Stored(0))?;
        data.extend_from_slice(first);

        for (offset, vector) in iter.enumerate() {
            let id = offset + 1;
            let vector = vector.as_ref();
            if vector.len() != dimension {
                return Err(SimError::DimensionMismatch {
                    vector: VectorRef::Stored(id),
                    expected: dimension,
                    found: vector.len(),
                });
            }
            check_finite(vector, VectorRef::Stored(id))?;
            data.extend_from_slice(vector);
        }

        Ok(Self {
            dimension,
            data,
            normalized: false,
        })
    }

    /// Build a store from a flat row-major buffer.
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.is_empty() {
            return Err(SimError::EmptyInput("no vectors supplied".to_string()));
        }
        if data.len() % dimension != 0 {
            return Err(SimError::DimensionMismatch {
                vector: VectorRef::Stored(data.len() / dimension),
                expected: dimension,
                found: data.len() % dimension,
            });
        }
        for (id, row) in data.chunks_exact(dimension).enumerate() {
            check_finite(row, VectorRef::Stored(id))?;
        }
        Ok(Self {
            dimension,
            data,
            normalized: false,
        })
    }

    /// Return a new store in which every vector has unit Euclidean norm.
    ///
    /// A store that is already normalized is returned as an exact copy, so
    /// repeated normalization never perturbs stored values. Fails with
    /// `DegenerateVector` for the first zero-norm vector.
    pub fn normalize(&self) -> Result<VectorStore> {
        if self.normalized {
            return Ok(self.clone());
        }

        let mut data = Vec::with_capacity(self.data.len());
        for (id, row) in self.rows().enumerate() {
            let norm = l2_norm(row);
            if norm == 0.0 {
                return Err(SimError::DegenerateVector { id });
            }
            data.extend(row.iter().map(|&x| (x as f64 / norm) as f32));
        }

        Ok(Self {
            dimension: self.dimension,
            data,
            normalized: true,
        })
    }

    /// Return the vector stored under `id`.
    pub fn get(&self, id: usize) -> Result<&[f32]> {
        if id >= self.size() {
            return Err(SimError::NotFound {
                id,
                size: self.size(),
            });
        }
        let start = id * self.dimension;
        Ok(&self.data[start..start + self.dimension])
    }

    /// Number of components per vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors.
    pub fn size(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Iterate `(id, vector)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f32])> + '_ {
        self.rows().enumerate()
    }

    /// The underlying row-major buffer.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dimension)
    }

    /// Mark a store whose rows are known to be unit length (e.g. one read
    /// back from a saved index) without rescaling it.
    pub(crate) fn assume_normalized(mut self) -> Self {
        self.normalized = true;
        self
    }
}

/// Dot product of two equal-length vectors.
///
/// Accumulates left to right in `f32`; the result is independent of argument
/// order, which keeps `dot(a, b) == dot(b, a)` exact.
#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm, accumulated in `f64`.
#[inline]
pub(crate) fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

/// Validate and normalize a query vector against a store dimension.
pub(crate) fn normalize_query(query: &[f32], dimension: usize) -> Result<Vec<f32>> {
    if query.len() != dimension {
        return Err(SimError::DimensionMismatch {
            vector: VectorRef::Query,
            expected: dimension,
            found: query.len(),
        });
    }
    check_finite(query, VectorRef::Query)?;
    let norm = l2_norm(query);
    if norm == 0.0 {
        return Err(SimError::DegenerateQuery);
    }
    Ok(query.iter().map(|&x| (x as f64 / norm) as f32).collect())
}

fn check_finite(vector: &[f32], which: VectorRef) -> Result<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(component) => Err(SimError::InvalidVector {
            vector: which,
            component,
        }),
        None => Ok(()),
    }
}
