//! Ingestion pipeline.
//!
//! Staged files go through load, split, embed, and upsert as one batch.
//! The staging area is cleared when the batch finishes, success or not,
//! and the caller gets back the collection status for the namespace.

use tracing::{info, warn};

use crate::chunk::Chunker;
use crate::embedding::EmbeddingClient;
use crate::error::IngestError;
use crate::extract;
use crate::index::VectorIndex;
use crate::models::{CollectionStatus, DocumentChunk, StagedFile};
use crate::staging::StagingArea;

pub struct IngestPipeline<'a> {
    pub staging: &'a StagingArea,
    pub chunker: Chunker,
    pub embeddings: &'a EmbeddingClient,
    pub index: &'a VectorIndex,
}

impl IngestPipeline<'_> {
    /// Ingest the staged files into the vector index. All-or-nothing:
    /// any failure aborts the batch and nothing partial is reported.
    pub async fn ingest(&self, files: Vec<StagedFile>) -> Result<CollectionStatus, IngestError> {
        let result = self.ingest_inner(files).await;
        if let Err(err) = self.staging.clear() {
            warn!(error = %err, "failed to clear staging area");
        }
        result
    }

    async fn ingest_inner(&self, files: Vec<StagedFile>) -> Result<CollectionStatus, IngestError> {
        let chunks = collect_chunks(&files, &self.chunker)?;
        info!(files = files.len(), chunks = chunks.len(), "split documents");

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embeddings.embed(&texts).await?;
            self.index.upsert(chunks, vectors).await?;
        }

        let status = self.index.status().await?;
        Ok(status)
    }
}

/// Load and split every staged file, preserving file order.
fn collect_chunks(files: &[StagedFile], chunker: &Chunker) -> Result<Vec<DocumentChunk>, IngestError> {
    let mut chunks = Vec::new();
    for file in files {
        for doc in extract::load(file)? {
            chunks.extend(chunker.split(&doc));
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn staged_txt(dir: &std::path::Path, name: &str, text: &str) -> StagedFile {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        StagedFile {
            path,
            name: name.to_string(),
            extension: PathBuf::from(name)
                .extension()
                .unwrap()
                .to_string_lossy()
                .to_string(),
            parent_dir: String::new(),
        }
    }

    #[test]
    fn chunks_keep_their_source_and_file_order() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            staged_txt(tmp.path(), "first.txt", &"alpha\n".repeat(400)),
            staged_txt(tmp.path(), "second.txt", "beta"),
        ];
        let chunks = collect_chunks(&files, &Chunker::new(1000, 200)).unwrap();

        assert!(chunks.len() > 2);
        let last = chunks.last().unwrap();
        assert_eq!(last.metadata.source, "second.txt");
        assert!(chunks[..chunks.len() - 1]
            .iter()
            .all(|c| c.metadata.source == "first.txt"));
    }

    #[test]
    fn a_bad_file_aborts_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            staged_txt(tmp.path(), "good.txt", "fine"),
            staged_txt(tmp.path(), "bad.zzz", "???"),
        ];
        let err = collect_chunks(&files, &Chunker::new(1000, 200)).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }
}
