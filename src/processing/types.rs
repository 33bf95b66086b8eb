//! Core data types and error definitions for the chunking pipeline.

use anyhow::Error as TokenizerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::SourceMetadata;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Splitter configured with an impossible budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new content in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Embedding model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// A window of document text ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text.
    pub text: String,
    /// Provenance inherited from the source document.
    pub metadata: SourceMetadata,
    /// SHA-256 of the text, hex encoded.
    pub chunk_hash: String,
}
