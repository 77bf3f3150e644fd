
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// BPE encodings the chunker knows how to load
pub const SUPPORTED_ENCODINGS: &[&str] = &["cl100k_base", "p50k_base", "r50k_base"];

// how far a window may grow past its nominal end to reach a UTF-8 boundary
const MAX_BOUNDARY_EXTENSION: usize = 4;

/// A slice of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The decoded chunk text
    pub text: String,
    /// Position of this chunk within its document
    pub index: usize,
    /// Number of BPE tokens in the chunk
    pub token_count: usize,
}

/// Configuration for token chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum number of tokens per chunk
    pub chunk_size: usize,
    /// Name of the BPE encoding used to count tokens
    pub encoding: String,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            encoding: "cl100k_base".to_string(),
        }
    }
}

/// Splits text into consecutive, non-overlapping windows of at most `chunk_size` tokens
pub struct TokenChunker {
    bpe: CoreBPE,
    chunk_size: usize,
}

impl std::fmt::Debug for TokenChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenChunker")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl TokenChunker {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(anyhow!("Chunk size must be greater than zero"));
        }

        let bpe = load_encoding(&config.encoding)?;
        Ok(Self {
            bpe,
            chunk_size: config.chunk_size,
        })
    }

    #[inline]
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Chunk `text` by tokens. Concatenating the chunk texts reproduces the input.
    #[inline]
    pub fn chunk(&self, text: &str) -> Result<Vec<TextChunk>> {
        let tokens = self.bpe.encode_ordinary(text);
        let decode = |from: usize, to: usize| self.bpe.decode(tokens[from..to].to_vec()).ok();

        let mut chunks = Vec::with_capacity(tokens.len().div_ceil(self.chunk_size));
        let mut start = 0;

        while start < tokens.len() {
            let nominal_end = (start + self.chunk_size).min(tokens.len());
            let (end, text) = decode_window(&decode, tokens.len(), start, nominal_end)
                .with_context(|| format!("Failed to decode tokens {}..{}", start, nominal_end))?;

            chunks.push(TextChunk {
                text,
                index: chunks.len(),
                token_count: end - start,
            });
            start = end;
        }

        debug!(
            "Chunked {} tokens into {} chunks of up to {} tokens",
            tokens.len(),
            chunks.len(),
            self.chunk_size
        );

        Ok(chunks)
    }
}

/// Decode the window `start..end`, moving `end` until the window ends on a
/// character boundary. Shrinking is preferred so chunks stay within the limit.
fn decode_window<F>(decode: &F, total: usize, start: usize, end: usize) -> Result<(usize, String)>
where
    F: Fn(usize, usize) -> Option<String>,
{
    for candidate in (start + 1..=end).rev() {
        if let Some(text) = decode(start, candidate) {
            return Ok((candidate, text));
        }
    }

    let limit = (end + MAX_BOUNDARY_EXTENSION).min(total);
    for candidate in end + 1..=limit {
        if let Some(text) = decode(start, candidate) {
            return Ok((candidate, text));
        }
    }

    Err(anyhow!("No character boundary found near token {}", end))
}

fn load_encoding(name: &str) -> Result<CoreBPE> {
    match name {
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "r50k_base" => tiktoken_rs::r50k_base(),
        other => Err(anyhow!(
            "Unsupported encoding '{}'. Supported: {}",
            other,
            SUPPORTED_ENCODINGS.join(", ")
        )),
    }
    .with_context(|| format!("Failed to load {} encoding", name))
}
