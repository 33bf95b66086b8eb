//! Chunk preparation helpers.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::loader::SourceMetadata;

use super::types::Chunk;

/// Deterministic digest used to spot repeated chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Attach metadata and hashes to raw chunk strings, dropping blanks and repeats.
///
/// `seen` is shared across documents so a boilerplate page repeated in several files is
/// indexed once. Returns the number of skipped duplicates alongside the kept chunks.
pub(crate) fn prepare_chunks(
    texts: Vec<String>,
    metadata: &SourceMetadata,
    seen: &mut HashSet<String>,
) -> (Vec<Chunk>, usize) {
    let mut prepared = Vec::new();
    let mut skipped = 0;

    for text in texts {
        if text.trim().is_empty() {
            continue;
        }
        let hash = compute_chunk_hash(&text);
        if seen.insert(hash.clone()) {
            prepared.push(Chunk {
                text,
                metadata: metadata.clone(),
                chunk_hash: hash,
            });
        } else {
            skipped += 1;
        }
    }

    (prepared, skipped)
}
