// Vector store module
// Records kept in the external vector index and the seam the rest of the crate talks to

pub mod pinecone;

pub use pinecone::PineconeClient;

use serde::{Deserialize, Deserializer, Serialize};

use crate::Result;

/// Metadata stored alongside each vector so a query can return text without a second lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Vector id, `<document-id>_chunk_<index>`
    pub id: String,
    /// File name of the source document
    pub source: String,
    /// Index of the chunk within its document
    #[serde(deserialize_with = "deserialize_chunk_index")]
    pub chunk: u32,
    /// The raw chunk text
    pub text: String,
}

/// A vector and its metadata, ready for upsert
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl VectorRecord {
    #[inline]
    pub fn for_chunk(document_id: &str, source: &str, chunk: u32, text: &str, values: Vec<f32>) -> Self {
        let id = chunk_id(document_id, chunk);
        Self {
            metadata: ChunkMetadata {
                id: id.clone(),
                source: source.to_string(),
                chunk,
                text: text.to_string(),
            },
            id,
            values,
        }
    }
}

/// One hit from a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Deterministic vector id for a document chunk
#[inline]
pub fn chunk_id(document_id: &str, chunk: u32) -> String {
    format!("{}_chunk_{}", document_id, chunk)
}

/// External similarity index
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records; returns how many the index accepted
    fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Top `top_k` matches for `vector`, best first
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>>;

    /// Remove every record in the configured namespace
    fn delete_all(&self) -> Result<()>;
}

// Pinecone hands numeric metadata back as floats
fn deserialize_chunk_index<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(serde::de::Error::custom(format!(
            "invalid chunk index: {}",
            value
        )));
    }
    Ok(value as u32)
}
