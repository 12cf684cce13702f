//! Batch ingestion: reaction metadata -> embedding provider -> vector store.

use tracing::{debug, info};

use rxnsim_core::config::SimConfig;
use rxnsim_core::error::{Result, SimError};
use rxnsim_core::types::ReactionTable;

use crate::embedding::EmbeddingProvider;
use crate::store::VectorStore;

/// Embed every reaction in `table` and build a raw (unnormalized) store.
///
/// Reactions are sent to the provider in chunks of `batch_size`. Vector `i`
/// of the resulting store belongs to `table.get(i)`. Fails with `Embedding`
/// if a reaction has no SMILES or the provider breaks its contract (wrong
/// number of vectors, wrong dimension); store construction errors
/// (`EmptyInput`, `InvalidVector`) propagate unchanged.
pub async fn embed_reactions<P: EmbeddingProvider>(
    provider: &P,
    table: &ReactionTable,
    batch_size: usize,
) -> Result<VectorStore> {
    if batch_size == 0 {
        return Err(SimError::Config("batch_size must be positive".to_string()));
    }
    if table.is_empty() {
        return Err(SimError::EmptyInput("reaction table is empty".to_string()));
    }

    if let Some((pos, record)) = table
        .records()
        .iter()
        .enumerate()
        .find(|(_, r)| r.rxn_smiles.trim().is_empty())
    {
        return Err(SimError::Embedding(format!(
            "reaction {} at position {} has no SMILES",
            record.id, pos
        )));
    }

    let expected_dim = provider.dimensions();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(table.len());

    for (chunk_idx, chunk) in table.records().chunks(batch_size).enumerate() {
        let inputs: Vec<String> = chunk.iter().map(|r| r.rxn_smiles.clone()).collect();
        let batch = provider.embed_batch(&inputs).await?;

        if batch.len() != inputs.len() {
            return Err(SimError::Embedding(format!(
                "provider returned {} vectors for a batch of {}",
                batch.len(),
                inputs.len()
            )));
        }
        if let Some(offset) = batch.iter().position(|v| v.len() != expected_dim) {
            return Err(SimError::Embedding(format!(
                "provider returned a vector of length {} for reaction {}, expected {}",
                batch[offset].len(),
                chunk[offset].id,
                expected_dim
            )));
        }

        vectors.extend(batch);
        debug!(
            chunk = chunk_idx,
            embedded = vectors.len(),
            total = table.len(),
            "Embedded reaction chunk"
        );
    }

    let store = VectorStore::build(&vectors)?;
    info!(
        vectors = store.size(),
        dimension = store.dimension(),
        "Reaction embeddings collected"
    );
    Ok(store)
}

/// [`embed_reactions`] with the chunk size taken from `[embedding]
/// batch_size`.
pub async fn embed_reactions_with_config<P: EmbeddingProvider>(
    provider: &P,
    table: &ReactionTable,
    config: &SimConfig,
) -> Result<VectorStore> {
    embed_reactions(provider, table, config.embedding.batch_size).await
}
