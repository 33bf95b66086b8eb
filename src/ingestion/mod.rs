//! Session-scoped ingestion for the chat, comparison and analysis modes.
//!
//! Every mode follows the same skeleton: save uploads into a directory, extract text, and (for
//! the chat modes) split, embed, index and persist. [`IndexBuilder`] owns the shared
//! split/embed/persist tail.

mod compare;
mod handler;
mod multi;
mod single;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Config;
use crate::embedding::SharedEmbeddingClient;
use crate::index::{IndexError, VectorIndex};
use crate::loader::{Document, LoaderError};
use crate::processing::{ChunkingError, TextSplitter};
use crate::retrieval::Retriever;
use crate::session::SessionError;

pub use compare::ComparisonIngestor;
pub use handler::DocumentHandler;
pub use multi::DocumentIngestor;
pub use single::SingleDocIngestor;

/// Errors raised while ingesting uploads.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Session directories could not be prepared.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Upload could not be saved or parsed.
    #[error(transparent)]
    Loader(#[from] LoaderError),
    /// Splitter rejected its configuration.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// Index build or persistence failed.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// None of the uploads produced a document.
    #[error("no valid documents loaded")]
    NoValidDocuments,
    /// Documents were loaded but contained no text.
    #[error("documents contain no extractable text")]
    NoText,
}

/// Summary of a completed chat ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Retriever over the freshly built index.
    pub retriever: Retriever,
    /// Paths the uploads were saved to.
    pub saved_files: Vec<PathBuf>,
    /// Directory holding the persisted index.
    pub index_dir: PathBuf,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// Chunks dropped as duplicates.
    pub skipped_duplicates: usize,
}

/// Split, embed, index and persist documents.
#[derive(Clone)]
pub struct IndexBuilder {
    splitter: TextSplitter,
    embedder: SharedEmbeddingClient,
    top_k: usize,
}

impl IndexBuilder {
    /// Builder from explicit parts.
    pub fn new(splitter: TextSplitter, embedder: SharedEmbeddingClient, top_k: usize) -> Self {
        Self {
            splitter,
            embedder,
            top_k,
        }
    }

    /// Builder using the configured splitter and top-k.
    pub fn from_config(
        config: &Config,
        embedder: SharedEmbeddingClient,
    ) -> Result<Self, ChunkingError> {
        Ok(Self::new(
            TextSplitter::from_config(config)?,
            embedder,
            config.retriever_top_k,
        ))
    }

    /// Embedding client used for indexing and queries.
    pub fn embedder(&self) -> &SharedEmbeddingClient {
        &self.embedder
    }

    /// Number of chunks each retriever returns.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Build an index over `documents`, save it to `index_dir`, and wrap it in a retriever.
    pub(crate) async fn create_retriever(
        &self,
        documents: &[Document],
        index_dir: &Path,
        saved_files: Vec<PathBuf>,
    ) -> Result<IngestOutcome, IngestionError> {
        let split = self.splitter.split_documents(documents);
        tracing::info!(
            chunks = split.chunks.len(),
            skipped_duplicates = split.skipped_duplicates,
            chunk_size = self.splitter.chunk_size(),
            chunk_overlap = self.splitter.chunk_overlap(),
            "Documents split into chunks"
        );
        if split.chunks.is_empty() {
            return Err(IngestionError::NoText);
        }

        let chunk_count = split.chunks.len();
        let index = VectorIndex::from_chunks(split.chunks, self.embedder.as_ref()).await?;
        index.save_local(index_dir).await?;
        let retriever = Retriever::new(index, self.embedder.clone(), self.top_k);
        tracing::info!(
            index_path = %index_dir.display(),
            k = self.top_k,
            "Retriever created successfully"
        );

        Ok(IngestOutcome {
            retriever,
            saved_files,
            index_dir: index_dir.to_path_buf(),
            chunk_count,
            skipped_duplicates: split.skipped_duplicates,
        })
    }
}
