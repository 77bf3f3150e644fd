// Embeddings module
// Token chunking of document text and the embedding seam used by ingestion and retrieval

pub mod chunking;

pub use chunking::{ChunkingConfig, TextChunk, TokenChunker};

use crate::Result;

/// Dimension produced by text-embedding-ada-002
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;

/// Turns text into a dense vector
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
