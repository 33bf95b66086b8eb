//! Chunking pipeline: splitting extracted text into overlapping windows.

pub mod chunking;
mod mappers;
pub mod types;

pub use chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, SplitOutcome, TextSplitter};
pub use mappers::compute_chunk_hash;
pub use types::{Chunk, ChunkingError};
