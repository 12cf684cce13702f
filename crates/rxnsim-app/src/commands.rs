//! Batch phases behind the CLI subcommands.
//!
//! Each phase reads its inputs from the paths in [`SimConfig`] (or an
//! explicit override) and returns a report value; printing is left to
//! `main`.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use rxnsim_core::config::SimConfig;
use rxnsim_core::error::{Result, SimError};
use rxnsim_core::types::ReactionTable;
use rxnsim_vector::{
    compare_with_rest, GroupComparison, GroupSelector, PairwiseEngine, SearchHit,
    SimilarityIndex, SimilarityMatrix, VectorStore,
};

/// One row of a reaction ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedReaction {
    pub rank: usize,
    pub rxn_id: String,
    pub name: String,
    pub ec_number: String,
    pub score: f32,
}

/// Result of the `group-stats` phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub ec_prefix: String,
    pub materialized: bool,
    #[serde(flatten)]
    pub comparison: GroupComparison,
}

/// Read raw fingerprints, normalize them and write the index.
pub fn build_index(
    config: &SimConfig,
    vectors: Option<&Path>,
    output: Option<&Path>,
) -> Result<SimilarityIndex> {
    let vectors_path = vectors.unwrap_or(&config.paths.vectors_file);
    let output_path = output.unwrap_or(&config.paths.index_file);

    let raw: Vec<Vec<f32>> = serde_json::from_str(&std::fs::read_to_string(vectors_path)?)?;
    let store = VectorStore::build(&raw)?;
    info!(
        path = %vectors_path.display(),
        vectors = store.size(),
        dimension = store.dimension(),
        "Raw fingerprints loaded"
    );

    let index = SimilarityIndex::build(&store)?;
    index.save(output_path)?;
    Ok(index)
}

/// Rank every reaction against the stored vector of `reaction_id` and write
/// the ranking to `paths.results_file`.
pub fn search_reaction(
    config: &SimConfig,
    reaction_id: &str,
    k: Option<usize>,
) -> Result<Vec<RankedReaction>> {
    let index = SimilarityIndex::load(&config.paths.index_file)?;
    let table = load_aligned_table(config, index.size())?;

    let position = table.position_of(reaction_id).ok_or_else(|| {
        SimError::InvalidMetadata(format!("unknown reaction id {}", reaction_id))
    })?;
    let k = k.unwrap_or(config.search.default_k);
    let hits = index.search_by_id(position, to_k(k))?;

    let ranking = label_hits(&table, &hits);
    write_results(&config.paths.results_file, &ranking)?;
    info!(
        reaction = reaction_id,
        k,
        path = %config.paths.results_file.display(),
        "Search results written"
    );
    Ok(ranking)
}

/// Search with a seeded uniform random query in [0, 1)^D.
pub fn probe(config: &SimConfig, seed: Option<u64>, k: Option<usize>) -> Result<Vec<SearchHit>> {
    let index = SimilarityIndex::load(&config.paths.index_file)?;
    let seed = seed.unwrap_or(config.search.probe_seed);
    let k = k.unwrap_or(config.search.probe_k);

    let query = random_query(index.dimension(), seed);
    let hits = index.search(&query, to_k(k))?;
    info!(seed, k, hits = hits.len(), "Probe search complete");
    Ok(hits)
}

/// Compute the full pairwise matrix from the saved index and write it.
pub fn build_matrix(config: &SimConfig, output: Option<&Path>) -> Result<SimilarityMatrix> {
    let index = SimilarityIndex::load(&config.paths.index_file)?;
    let limit = config.analysis.max_materialized_vectors;
    if index.size() > limit {
        return Err(SimError::Config(format!(
            "refusing to materialize a {n}x{n} matrix (analysis.max_materialized_vectors = {limit})",
            n = index.size()
        )));
    }

    let matrix = PairwiseEngine::from_index(&index).compute_full()?;
    matrix.save(output.unwrap_or(&config.paths.matrix_file))?;
    Ok(matrix)
}

/// Compare the reactions whose first EC number starts with `ec_prefix`
/// against all other reactions.
///
/// With `materialized` the values come from the saved matrix. Without it, or
/// when the table is too large to materialize, only the needed blocks are
/// computed from the index.
pub fn group_stats(
    config: &SimConfig,
    ec_prefix: Option<&str>,
    materialized: bool,
) -> Result<GroupReport> {
    let ec_prefix = ec_prefix.unwrap_or(&config.analysis.ec_prefix).to_string();
    let table = ReactionTable::load(&config.paths.metadata_file)?;
    let group = GroupSelector::from_predicate(table.records(), |r| r.has_ec_prefix(&ec_prefix));
    info!(
        ec_prefix = %ec_prefix,
        group = group.len(),
        reactions = table.len(),
        "Reaction group selected"
    );

    let use_matrix = materialized && table.len() <= config.analysis.max_materialized_vectors;
    if materialized && !use_matrix {
        warn!(
            reactions = table.len(),
            limit = config.analysis.max_materialized_vectors,
            "Too many reactions for the full matrix, computing blocks instead"
        );
    }

    let comparison = if use_matrix {
        let matrix = SimilarityMatrix::load(&config.paths.matrix_file)?;
        check_alignment(table.len(), matrix.size(), "matrix")?;
        compare_with_rest(&matrix, &group, table.len())?
    } else {
        let index = SimilarityIndex::load(&config.paths.index_file)?;
        check_alignment(table.len(), index.size(), "index")?;
        PairwiseEngine::from_index(&index).compare_with_rest(&group)?
    };

    Ok(GroupReport {
        ec_prefix,
        materialized: use_matrix,
        comparison,
    })
}

/// Attach reaction metadata to search hits; ranks start at 1.
pub fn label_hits(table: &ReactionTable, hits: &[SearchHit]) -> Vec<RankedReaction> {
    hits.iter()
        .enumerate()
        .map(|(rank, hit)| {
            let record = table.get(hit.id);
            RankedReaction {
                rank: rank + 1,
                rxn_id: record.map(|r| r.id.clone()).unwrap_or_default(),
                name: record.map(|r| r.name.clone()).unwrap_or_default(),
                ec_number: record
                    .and_then(|r| r.primary_ec())
                    .unwrap_or_default()
                    .to_string(),
                score: hit.score,
            }
        })
        .collect()
}

fn load_aligned_table(config: &SimConfig, vectors: usize) -> Result<ReactionTable> {
    let table = ReactionTable::load(&config.paths.metadata_file)?;
    check_alignment(table.len(), vectors, "index")?;
    Ok(table)
}

fn check_alignment(reactions: usize, vectors: usize, artifact: &str) -> Result<()> {
    if reactions != vectors {
        return Err(SimError::InvalidMetadata(format!(
            "metadata lists {} reactions but the {} holds {} vectors",
            reactions, artifact, vectors
        )));
    }
    Ok(())
}

fn random_query(dimension: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..dimension).map(|_| rng.random::<f32>()).collect()
}

fn write_results(path: &Path, ranking: &[RankedReaction]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(ranking)?)?;
    Ok(())
}

/// CLI counts are unsigned; saturate rather than wrap into a negative k.
fn to_k(k: usize) -> i64 {
    i64::try_from(k).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxnsim_core::types::ReactionRecord;
    use std::path::PathBuf;

    /// Six reactions on the unit circle; the first three share EC 3.5.1.
    fn fixture(dir: &Path) -> SimConfig {
        let degrees = [0.0f32, 20.0, 50.0, 180.0, 200.0, 90.0];
        let vectors: Vec<Vec<f32>> = degrees
            .iter()
            .map(|d| {
                let r = d.to_radians();
                // Scaled so that normalization actually does something.
                vec![3.0 * r.cos(), 3.0 * r.sin()]
            })
            .collect();
        let ecs = ["3.5.1.4", "3.5.1.9", "3.5.1.2", "2.7.1.1", "1.1.1.1", "4.2.1.1"];
        let records = ecs
            .iter()
            .enumerate()
            .map(|(i, ec)| ReactionRecord {
                id: format!("rxn{:05}", i),
                name: format!("reaction {}", i),
                ec_numbers: vec![ec.to_string()],
                ..Default::default()
            })
            .collect();

        let mut config = SimConfig::default();
        config.paths.vectors_file = dir.join("vectors.json");
        config.paths.metadata_file = dir.join("rxn_data.json");
        config.paths.index_file = dir.join("out/reactions.idx");
        config.paths.matrix_file = dir.join("out/pairs.mat");
        config.paths.results_file = dir.join("out/query_result.json");

        std::fs::write(
            &config.paths.vectors_file,
            serde_json::to_string(&vectors).unwrap(),
        )
        .unwrap();
        ReactionTable::new(records)
            .unwrap()
            .save(&config.paths.metadata_file)
            .unwrap();
        config
    }

    #[test]
    fn test_build_index_writes_normalized_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());

        let index = build_index(&config, None, None).unwrap();
        assert_eq!(index.size(), 6);
        assert!(config.paths.index_file.exists());

        let loaded = SimilarityIndex::load(&config.paths.index_file).unwrap();
        assert!(loaded.store().is_normalized());
        assert_eq!(loaded.store().as_flat(), index.store().as_flat());
    }

    #[test]
    fn test_build_index_explicit_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());
        let out: PathBuf = dir.path().join("custom.idx");

        build_index(&config, Some(&config.paths.vectors_file), Some(&out)).unwrap();
        assert!(out.exists());
        assert!(!config.paths.index_file.exists());
    }

    #[test]
    fn test_search_reaction_ranks_and_writes_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());
        build_index(&config, None, None).unwrap();

        let ranking = search_reaction(&config, "rxn00001", Some(3)).unwrap();
        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[0].rxn_id, "rxn00001");
        assert!((ranking[0].score - 1.0).abs() < 1e-5);
        // 0 degrees is 20 away from 20, 50 degrees is 30 away.
        assert_eq!(ranking[1].rxn_id, "rxn00000");
        assert_eq!(ranking[2].rxn_id, "rxn00002");
        assert_eq!(ranking[1].ec_number, "3.5.1.4");

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.paths.results_file).unwrap())
                .unwrap();
        assert_eq!(written.as_array().unwrap().len(), 3);
        assert_eq!(written[0]["rxn_id"], "rxn00001");
    }

    #[test]
    fn test_search_reaction_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());
        build_index(&config, None, None).unwrap();

        let result = search_reaction(&config, "rxn99999", None);
        assert!(matches!(result, Err(SimError::InvalidMetadata(_))));
    }

    #[test]
    fn test_search_reaction_rejects_misaligned_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());
        build_index(&config, None, None).unwrap();

        let short = ReactionTable::new(vec![ReactionRecord {
            id: "rxn00000".to_string(),
            ..Default::default()
        }])
        .unwrap();
        short.save(&config.paths.metadata_file).unwrap();

        let result = search_reaction(&config, "rxn00000", None);
        assert!(matches!(result, Err(SimError::InvalidMetadata(_))));
    }

    #[test]
    fn test_probe_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());
        build_index(&config, None, None).unwrap();

        let first = probe(&config, None, None).unwrap();
        let second = probe(&config, Some(config.search.probe_seed), None).unwrap();
        assert_eq!(first.len(), config.search.probe_k);
        assert_eq!(first, second);

        // Random queries live in the positive quadrant, so the 90 degree
        // reaction or one between 0 and 50 degrees must lead.
        assert!([0, 1, 2, 5].contains(&first[0].id));
    }

    #[test]
    fn test_random_query_range() {
        let q = random_query(64, 3);
        assert_eq!(q.len(), 64);
        assert!(q.iter().all(|&x| (0.0..1.0).contains(&x)));
        assert_eq!(q, random_query(64, 3));
        assert_ne!(q, random_query(64, 4));
    }

    #[test]
    fn test_build_matrix_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixture(dir.path());
        build_index(&config, None, None).unwrap();

        config.analysis.max_materialized_vectors = 5;
        assert!(matches!(
            build_matrix(&config, None),
            Err(SimError::Config(_))
        ));
        assert!(!config.paths.matrix_file.exists());

        config.analysis.max_materialized_vectors = 6;
        let matrix = build_matrix(&config, None).unwrap();
        assert_eq!(matrix.size(), 6);
        assert!(config.paths.matrix_file.exists());
    }

    #[test]
    fn test_group_stats_sources_agree() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());
        build_index(&config, None, None).unwrap();
        build_matrix(&config, None).unwrap();

        let blocks = group_stats(&config, None, false).unwrap();
        let matrix = group_stats(&config, None, true).unwrap();

        assert_eq!(blocks.ec_prefix, "3.5.1.");
        assert!(!blocks.materialized);
        assert!(matrix.materialized);
        assert_eq!(blocks.comparison, matrix.comparison);

        let c = &blocks.comparison;
        assert_eq!(c.group_size, 3);
        assert_eq!(c.rest_size, 3);
        assert_eq!(c.intra.count, 3);
        assert_eq!(c.cross.count, 9);
        // Group members sit within 50 degrees of each other.
        assert!(c.intra.mean > 0.6);
        assert!(c.cross.mean < c.intra.mean);
    }

    #[test]
    fn test_group_stats_falls_back_to_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixture(dir.path());
        build_index(&config, None, None).unwrap();
        config.analysis.max_materialized_vectors = 2;

        // No matrix file exists; the block form must be used.
        let report = group_stats(&config, Some("3.5.1."), true).unwrap();
        assert!(!report.materialized);
        assert_eq!(report.comparison.group_size, 3);
    }

    #[test]
    fn test_group_stats_too_small_group() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());
        build_index(&config, None, None).unwrap();

        let result = group_stats(&config, Some("2.7."), false);
        assert!(matches!(
            result,
            Err(SimError::InsufficientGroupSize { .. })
        ));
    }

    #[test]
    fn test_to_k_saturates() {
        assert_eq!(to_k(30), 30);
        assert_eq!(to_k(usize::MAX), i64::MAX);
    }
}
