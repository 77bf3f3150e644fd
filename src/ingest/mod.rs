//! Document ingestion
//!
//! Walks a folder of PDFs, extracts their text, splits it into token windows,
//! embeds each window and upserts the vectors with their chunk metadata.


use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::embeddings::{Embedder, TokenChunker};
use crate::vector_store::{VectorIndex, VectorRecord};
use crate::{PaddleError, Result};

/// Totals for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub skipped: usize,
    pub chunks: usize,
}

pub struct Ingestor {
    chunker: TokenChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("chunker", &self.chunker)
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    #[inline]
    pub fn new(
        chunker: TokenChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
        }
    }

    /// Chunk, embed and upsert one document's text. Returns the number of chunks written.
    #[inline]
    pub fn ingest_text(&self, document_id: &str, source: &str, text: &str) -> Result<usize> {
        if text.trim().is_empty() {
            warn!("Document {} has no text, skipping", source);
            return Ok(0);
        }

        let chunks = self
            .chunker
            .chunk(text)
            .map_err(|e| PaddleError::Ingest(format!("Failed to chunk {}: {:#}", source, e)))?;

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let values = self.embedder.embed(&chunk.text)?;
            let index = u32::try_from(chunk.index).map_err(|_| {
                PaddleError::Ingest(format!("{} has too many chunks", source))
            })?;
            records.push(VectorRecord::for_chunk(
                document_id,
                source,
                index,
                &chunk.text,
                values,
            ));
        }

        let upserted = self.index.upsert(&records)?;
        info!(
            "Indexed {} chunks from {} ({} vectors accepted)",
            records.len(),
            source,
            upserted
        );
        Ok(records.len())
    }

    #[inline]
    pub fn ingest_file(&self, path: &Path) -> Result<usize> {
        let text = extract_pdf_text(path)?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest_text(&document_id(path), &source, &text)
    }

    /// Ingest every PDF in `folder` in name order. Unreadable or empty files
    /// are skipped; upstream failures abort the run.
    #[inline]
    pub fn ingest_folder(&self, folder: &Path) -> Result<IngestStats> {
        let files = list_pdfs(folder)?;
        info!("Found {} PDF files in {}", files.len(), folder.display());

        let bar = progress_bar(files.len() as u64);
        let mut stats = IngestStats::default();

        for path in &files {
            bar.set_message(path.display().to_string());

            match self.ingest_file(path) {
                Ok(0) => stats.skipped += 1,
                Ok(chunks) => {
                    stats.documents += 1;
                    stats.chunks += chunks;
                }
                Err(PaddleError::Ingest(message)) => {
                    warn!("Skipping {}: {}", path.display(), message);
                    stats.skipped += 1;
                }
                Err(e) => {
                    bar.abandon();
                    return Err(e);
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        Ok(stats)
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}") {
        bar.set_style(style);
    }
    bar
}

/// Extract the text layer of a PDF. Read failures and parser panics on
/// malformed files are reported as [`PaddleError::Ingest`].
#[inline]
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| {
        PaddleError::Ingest(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let text = panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
        .map_err(|_| {
            PaddleError::Ingest(format!("PDF parser crashed on {}", path.display()))
        })?
        .map_err(|e| {
            PaddleError::Ingest(format!("Failed to extract text from {}: {}", path.display(), e))
        })?;
    debug!("Extracted {} characters from {}", text.len(), path.display());
    Ok(text)
}

/// File name up to its first `.`
#[inline]
pub fn document_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}

/// PDF files directly inside `folder`, sorted by name
#[inline]
pub fn list_pdfs(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(PaddleError::Ingest(format!(
            "{} is not a directory",
            folder.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
