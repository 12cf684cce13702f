//! rxnsim vector crate - normalized vector store, exact cosine index,
//! pairwise similarity, and group statistics.
//!
//! Also holds the boundary pieces around that core: binary persistence of
//! indexes and matrices, the embedding-provider trait with a mock
//! implementation for testing, and the batch ingestion step.

pub mod embedding;
pub mod index;
pub mod pairwise;
pub mod persist;
pub mod pipeline;
pub mod stats;
pub mod store;

pub use embedding::{EmbeddingProvider, MockEmbedding};
pub use index::{SearchHit, SimilarityIndex};
pub use pairwise::{PairBlock, PairwiseEngine, SimilarityMatrix};
pub use pipeline::{embed_reactions, embed_reactions_with_config};
pub use stats::{
    compare_with_rest, cross_group, intra_group, GroupComparison, GroupSelector,
    SimilaritySource, SimilarityStatistics,
};
pub use store::VectorStore;
