//! Flat vector index with cosine similarity, persisted as JSON inside a session directory.
//!
//! Session indexes hold at most a few thousand chunks, so an exhaustive scan answers a query
//! in well under a millisecond and keeps the on-disk format trivially inspectable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::loader::SourceMetadata;
use crate::processing::Chunk;

/// File name of the persisted index inside its directory.
pub const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;
const EMBED_BATCH_SIZE: usize = 64;

/// Errors raised while building, querying or persisting an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No chunks were supplied to build an index from.
    #[error("cannot build an index without chunks")]
    Empty,
    /// Persisted index directory or file does not exist.
    #[error("index not found at {0}")]
    NotFound(PathBuf),
    /// Reading or writing the index failed.
    #[error("index I/O error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Persisted index could not be encoded or decoded.
    #[error("index serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Index was built with a different embedding model than the current one.
    #[error("index was built with embedding model '{stored}', current model is '{current}'")]
    ModelMismatch {
        /// Model recorded in the index.
        stored: String,
        /// Model currently configured.
        current: String,
    },
    /// Vector length does not match the index dimension.
    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Embedding provider failed while building the index.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
}

/// Stored chunk with its vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Random identifier assigned at insertion.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Provenance of the chunk.
    pub metadata: SourceMetadata,
    /// Embedding of the chunk.
    pub vector: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// Identifier of the matching entry.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Provenance of the chunk.
    pub metadata: SourceMetadata,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// In-memory similarity index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    version: u32,
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Empty index for vectors of `dimension` produced by `embedding_model`.
    pub fn new(embedding_model: impl Into<String>, dimension: usize) -> Self {
        Self {
            version: FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimension,
            entries: Vec::new(),
        }
    }

    /// Embed `chunks` in batches and index them.
    pub async fn from_chunks(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingClient,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }
        let mut index = Self::new(embedder.model_name(), embedder.dimension());
        let mut pending = chunks.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(EMBED_BATCH_SIZE).collect();
            let texts = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = embedder.generate_embeddings(texts).await?;
            for (chunk, vector) in batch.into_iter().zip(vectors) {
                index.add(chunk.text, chunk.metadata, vector)?;
            }
        }
        tracing::debug!(
            entries = index.len(),
            model = %index.embedding_model,
            "Vector index built"
        );
        Ok(index)
    }

    /// Insert one entry.
    pub fn add(
        &mut self,
        text: String,
        metadata: SourceMetadata,
        vector: Vec<f32>,
    ) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.entries.push(IndexEntry {
            id: Uuid::new_v4().to_string(),
            text,
            metadata,
            vector,
        });
        Ok(())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model the stored vectors were produced with.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Vector length accepted by the index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Return up to `k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order.
    pub fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query, &entry.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(position, score)| {
                let entry = &self.entries[position];
                ScoredChunk {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    score,
                }
            })
            .collect())
    }

    /// Write the index to `dir/index.json`, creating `dir` when needed.
    pub async fn save_local(&self, dir: &Path) -> Result<PathBuf, IndexError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| IndexError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        let path = dir.join(INDEX_FILE);
        let encoded = serde_json::to_vec(self)?;
        tokio::fs::write(&path, encoded)
            .await
            .map_err(|source| IndexError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), entries = self.len(), "Vector index saved");
        Ok(path)
    }

    /// Load an index from `dir`, refusing indexes built with a different embedding model or
    /// vector dimension.
    pub async fn load_local(
        dir: &Path,
        embedding_model: &str,
        dimension: usize,
    ) -> Result<Self, IndexError> {
        let path = dir.join(INDEX_FILE);
        if !dir.is_dir() || !path.is_file() {
            return Err(IndexError::NotFound(dir.to_path_buf()));
        }
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| IndexError::Io {
                path: path.clone(),
                source,
            })?;
        let index: Self = serde_json::from_slice(&bytes)?;
        if index.embedding_model != embedding_model {
            return Err(IndexError::ModelMismatch {
                stored: index.embedding_model,
                current: embedding_model.to_string(),
            });
        }
        if index.dimension != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimension,
                actual: dimension,
            });
        }
        tracing::info!(path = %path.display(), entries = index.len(), "Vector index loaded");
        Ok(index)
    }
}

/// Cosine similarity; zero vectors score `0.0`.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
