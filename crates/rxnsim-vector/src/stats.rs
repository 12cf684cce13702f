//! Intra-group and cross-group similarity statistics.
//!
//! Statistics only need similarity values, so they are computed against any
//! [`SimilaritySource`]: a materialized [`SimilarityMatrix`], a [`PairBlock`]
//! covering just the groups involved, or the [`PairwiseEngine`] itself
//! (one dot product per pair). Pairs are visited in ascending id order and
//! accumulated in `f64`, so every source yields the same result.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use rxnsim_core::error::{Result, SimError};

use crate::pairwise::{PairBlock, PairwiseEngine, SimilarityMatrix};

/// Anything that can report the similarity of two stored vectors.
pub trait SimilaritySource {
    fn similarity(&self, i: usize, j: usize) -> Result<f32>;
}

impl SimilaritySource for SimilarityMatrix {
    fn similarity(&self, i: usize, j: usize) -> Result<f32> {
        self.get(i, j).ok_or_else(|| SimError::NotFound {
            id: if i >= self.size() { i } else { j },
            size: self.size(),
        })
    }
}

impl SimilaritySource for PairBlock {
    fn similarity(&self, i: usize, j: usize) -> Result<f32> {
        self.get(i, j).ok_or_else(|| {
            if self.rows().contains(&i) {
                SimError::NotFound {
                    id: j,
                    size: self.cols().len(),
                }
            } else {
                SimError::NotFound {
                    id: i,
                    size: self.rows().len(),
                }
            }
        })
    }
}

impl SimilaritySource for PairwiseEngine<'_> {
    fn similarity(&self, i: usize, j: usize) -> Result<f32> {
        PairwiseEngine::similarity(self, i, j)
    }
}

/// Ordered, duplicate-free set of identifiers forming one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSelector {
    ids: Vec<usize>,
}

impl GroupSelector {
    /// Build a selector; identifiers are sorted and deduplicated.
    pub fn new<I: IntoIterator<Item = usize>>(ids: I) -> Self {
        let mut ids: Vec<usize> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// Select the positions of `items` for which `pred` holds.
    ///
    /// Typically `items` is the metadata table aligned with the store, and
    /// `pred` tests a label (for example an EC number prefix).
    pub fn from_predicate<T>(items: &[T], pred: impl Fn(&T) -> bool) -> Self {
        Self {
            ids: items
                .iter()
                .enumerate()
                .filter(|(_, item)| pred(item))
                .map(|(pos, _)| pos)
                .collect(),
        }
    }

    /// Every identifier in `0..universe` that is not in this group.
    pub fn complement(&self, universe: usize) -> Self {
        Self {
            ids: (0..universe).filter(|id| !self.contains(*id)).collect(),
        }
    }

    pub fn contains(&self, id: usize) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().copied()
    }
}

/// Count, mean and population standard deviation over a pair collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityStatistics {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// A group compared with itself and with everything outside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupComparison {
    pub group_size: usize,
    pub rest_size: usize,
    /// Unique pairs inside the group.
    pub intra: SimilarityStatistics,
    /// Every (group member, non-member) pair.
    pub cross: SimilarityStatistics,
}

/// Statistics over every unordered pair `{i, j}`, `i != j`, within `group`.
///
/// Fails with `InsufficientGroupSize` if the group has fewer than two
/// members.
pub fn intra_group<S>(source: &S, group: &GroupSelector) -> Result<SimilarityStatistics>
where
    S: SimilaritySource + ?Sized,
{
    require_size(group, "group", 2)?;

    let ids = group.ids();
    let mut acc = Accumulator::default();
    for (pos, &i) in ids.iter().enumerate() {
        for &j in &ids[pos + 1..] {
            acc.push(source.similarity(i, j)?);
        }
    }
    Ok(acc.finish())
}

/// Statistics over every ordered pair `(i, j)` with `i` in `a` and `j` in
/// `b`.
///
/// Overlapping members are not excluded: an id present in both groups
/// contributes its self-similarity of 1.0. Fails with
/// `InsufficientGroupSize` naming `"a"` or `"b"` if either group is empty.
pub fn cross_group<S>(
    source: &S,
    a: &GroupSelector,
    b: &GroupSelector,
) -> Result<SimilarityStatistics>
where
    S: SimilaritySource + ?Sized,
{
    require_size(a, "a", 1)?;
    require_size(b, "b", 1)?;
    cross_unchecked(source, a, b)
}

/// Compare `group` with the rest of a store of `universe` vectors.
///
/// Fails with `InsufficientGroupSize` naming `"group"` if the group has
/// fewer than two members, or `"rest"` if it covers the whole store.
pub fn compare_with_rest<S>(
    source: &S,
    group: &GroupSelector,
    universe: usize,
) -> Result<GroupComparison>
where
    S: SimilaritySource + ?Sized,
{
    let rest = group.complement(universe);
    require_size(group, "group", 2)?;
    require_size(&rest, "rest", 1)?;
    Ok(GroupComparison {
        group_size: group.len(),
        rest_size: rest.len(),
        intra: intra_group(source, group)?,
        cross: cross_unchecked(source, group, &rest)?,
    })
}

impl PairwiseEngine<'_> {
    /// [`intra_group`] computed in parallel, one dot product per unique
    /// pair.
    pub fn intra_group_stats(&self, group: &GroupSelector) -> Result<SimilarityStatistics> {
        require_size(group, "group", 2)?;

        let ids = group.ids();
        let rows = ids
            .par_iter()
            .enumerate()
            .map(|(pos, &i)| {
                ids[pos + 1..]
                    .iter()
                    .map(|&j| self.similarity(i, j))
                    .collect::<Result<Vec<f32>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut acc = Accumulator::default();
        for value in rows.into_iter().flatten() {
            acc.push(value);
        }
        Ok(acc.finish())
    }

    /// [`cross_group`] computed from the `a` x `b` block only.
    pub fn cross_group_stats(
        &self,
        a: &GroupSelector,
        b: &GroupSelector,
    ) -> Result<SimilarityStatistics> {
        require_size(a, "a", 1)?;
        require_size(b, "b", 1)?;
        let block = self.compute_pairs(a.ids(), b.ids())?;
        cross_unchecked(&block, a, b)
    }

    /// [`compare_with_rest`] over this engine's store, block by block.
    pub fn compare_with_rest(&self, group: &GroupSelector) -> Result<GroupComparison> {
        let rest = group.complement(self.store().size());
        require_size(group, "group", 2)?;
        require_size(&rest, "rest", 1)?;
        let block = self.compute_pairs(group.ids(), rest.ids())?;
        Ok(GroupComparison {
            group_size: group.len(),
            rest_size: rest.len(),
            intra: self.intra_group_stats(group)?,
            cross: cross_unchecked(&block, group, &rest)?,
        })
    }
}

fn require_size(group: &GroupSelector, name: &'static str, required: usize) -> Result<()> {
    if group.len() < required {
        return Err(SimError::InsufficientGroupSize {
            group: name,
            required,
            found: group.len(),
        });
    }
    Ok(())
}

fn cross_unchecked<S>(
    source: &S,
    a: &GroupSelector,
    b: &GroupSelector,
) -> Result<SimilarityStatistics>
where
    S: SimilaritySource + ?Sized,
{
    let mut acc = Accumulator::default();
    for i in a.iter() {
        for j in b.iter() {
            acc.push(source.similarity(i, j)?);
        }
    }
    Ok(acc.finish())
}

/// Welford running mean / variance.
#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Accumulator {
    fn push(&mut self, value: f32) {
        let x = value as f64;
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn finish(self) -> SimilarityStatistics {
        let variance = if self.count > 0 {
            (self.m2 / self.count as f64).max(0.0)
        } else {
            0.0
        };
        SimilarityStatistics {
            count: self.count,
            mean: self.mean,
            std_dev: variance.sqrt(),
        }
    }
}
