use std::path::Path;
use std::sync::Arc;

use crate::embedding::SharedEmbeddingClient;
use crate::index::{IndexError, ScoredChunk, VectorIndex};

use super::RetrievalError;

/// Default number of chunks returned per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Top-k similarity search over a vector index.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: SharedEmbeddingClient,
    k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("entries", &self.index.len())
            .field("model", &self.index.embedding_model())
            .field("k", &self.k)
            .finish()
    }
}

impl Retriever {
    /// Wrap an index; the embedder must be the one the index was built with.
    pub fn new(index: VectorIndex, embedder: SharedEmbeddingClient, k: usize) -> Self {
        Self {
            index: Arc::new(index),
            embedder,
            k: k.max(1),
        }
    }

    /// Load a persisted index from `dir` and wrap it.
    pub async fn from_index_dir(
        dir: &Path,
        embedder: SharedEmbeddingClient,
        k: usize,
    ) -> Result<Self, IndexError> {
        let index =
            VectorIndex::load_local(dir, embedder.model_name(), embedder.dimension()).await?;
        Ok(Self::new(index, embedder, k))
    }

    /// Number of chunks returned per query.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the underlying index is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Embed `query` and return the `k` most similar chunks.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self.index.similarity_search(&vector, self.k)?;
        tracing::debug!(hits = hits.len(), k = self.k, "Retrieved context");
        Ok(hits)
    }
}

/// Join chunk texts with blank lines, in rank order.
pub fn format_docs(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
