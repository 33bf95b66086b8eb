//! Text splitting with overlapping windows.
//!
//! Documents are split into chunks of at most `chunk_size` units, where a unit is either a
//! character (the default, 1000 with 300 overlap) or a tokenizer token. Highlights:
//!
//! - Boundaries: `semchunk-rs` prefers paragraph, line, sentence, then word boundaries, so
//!   chunks rarely cut words in half.
//! - Overlap: each chunk after the first is prefixed with up to `chunk_overlap` units from the
//!   tail of its predecessor. The semantic pass runs with `chunk_size - chunk_overlap` so the
//!   prefixed chunk still fits the budget.
//! - Token counting: `tiktoken-rs` for known encodings; a whitespace counter when the model's
//!   tokenizer is unavailable (common for Ollama models).

use crate::config::{Config, EmbeddingProvider, SplitUnit};
use crate::loader::Document;
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::collections::HashSet;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

use super::mappers::prepare_chunks;
use super::types::{Chunk, ChunkingError};

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Default chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 300;

/// Result of splitting a batch of documents.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// Chunks in document order.
    pub chunks: Vec<Chunk>,
    /// Chunks dropped because identical text was already produced.
    pub skipped_duplicates: usize,
}

/// Splits text into overlapping windows measured by a pluggable counter.
#[derive(Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    counter: TokenCounter,
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish_non_exhaustive()
    }
}

impl TextSplitter {
    /// Character-based splitter.
    pub fn characters(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            counter: character_counter(),
        })
    }

    /// Token-based splitter using the embedding model's tokenizer.
    pub fn tokens(
        chunk_size: usize,
        chunk_overlap: usize,
        provider: EmbeddingProvider,
        model: &str,
    ) -> Result<Self, ChunkingError> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            counter: build_token_counter(provider, model)?,
        })
    }

    /// Build the splitter described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        match config.text_splitter_unit {
            SplitUnit::Characters => Self::characters(
                config.text_splitter_chunk_size,
                config.text_splitter_chunk_overlap,
            ),
            SplitUnit::Tokens => Self::tokens(
                config.text_splitter_chunk_size,
                config.text_splitter_chunk_overlap,
                config.embedding_provider,
                &config.embedding_model,
            ),
        }
    }

    /// Maximum chunk length.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap carried between neighbouring chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Measure `text` in this splitter's unit.
    pub fn measure(&self, text: &str) -> usize {
        self.counter.as_ref()(text)
    }

    /// Split raw text. Returns an empty vector for whitespace-only input.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let base_size = self.chunk_size - self.chunk_overlap;
        let counter_for_chunker = self.counter.clone();
        let chunker = Chunker::new(
            base_size,
            Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
        );
        let mut base_chunks = Vec::new();
        for segment in isolate_long_runs(text, base_size, &self.counter) {
            match segment {
                Segment::Text(piece) if !piece.trim().is_empty() => {
                    base_chunks.extend(chunker.chunk(piece));
                }
                Segment::Text(_) => {}
                Segment::Run(run) => {
                    base_chunks.extend(char_windows(run, base_size, &self.counter));
                }
            }
        }
        base_chunks.retain(|chunk| !chunk.trim().is_empty());
        apply_overlap(base_chunks, self.chunk_size, self.chunk_overlap, &self.counter)
    }

    /// Split documents, keeping each chunk's provenance and dropping repeated chunks.
    pub fn split_documents(&self, documents: &[Document]) -> SplitOutcome {
        let mut seen = HashSet::new();
        let mut chunks = Vec::new();
        let mut skipped_duplicates = 0;
        for document in documents {
            let texts = self.split_text(&document.page_content);
            let (prepared, skipped) = prepare_chunks(texts, &document.metadata, &mut seen);
            skipped_duplicates += skipped;
            chunks.extend(prepared);
        }
        SplitOutcome {
            chunks,
            skipped_duplicates,
        }
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            counter: character_counter(),
        }
    }
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<(), ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if chunk_overlap >= chunk_size {
        return Err(ChunkingError::InvalidOverlap {
            overlap: chunk_overlap,
            chunk_size,
        });
    }
    Ok(())
}

/// Non-whitespace characters `semchunk-rs` treats as split points.
const SEMANTIC_SEPARATORS: [char; 25] = [
    '.', '?', '!', '*', ';', ',', '(', ')', '[', ']', '\u{201C}', '\u{201D}', '\u{2018}',
    '\u{2019}', '\'', '"', '`', ':', '\u{2014}', '\u{2026}', '/', '\\', '\u{2013}', '&', '-',
];

enum Segment<'a> {
    /// Text the semantic chunker can split on its own.
    Text(&'a str),
    /// Separator-free run longer than the budget.
    Run(&'a str),
}

fn is_split_point(ch: char) -> bool {
    ch.is_whitespace() || SEMANTIC_SEPARATORS.contains(&ch)
}

/// Pull out separator-free runs that exceed `limit`.
///
/// `semchunk-rs` falls back to a per-character split for such runs and indexes that split with
/// a byte length, which panics on multibyte text (CJK prose without spaces, for one). Runs
/// are windowed here instead, so the chunker only sees runs that already fit.
fn isolate_long_runs<'a>(
    text: &'a str,
    limit: usize,
    counter: &TokenCounter,
) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut run_start = None;
    let sentinel = std::iter::once((text.len(), ' '));
    for (offset, ch) in text.char_indices().chain(sentinel) {
        if !is_split_point(ch) {
            run_start.get_or_insert(offset);
            continue;
        }
        let Some(start) = run_start.take() else {
            continue;
        };
        let run = &text[start..offset];
        // A run of at most `limit` bytes cannot measure more than `limit` units.
        if run.len() > limit && counter.as_ref()(run) > limit {
            if text_start < start {
                segments.push(Segment::Text(&text[text_start..start]));
            }
            segments.push(Segment::Run(run));
            text_start = offset;
        }
    }
    if text_start < text.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }
    segments
}

/// Cut `run` into consecutive windows measuring at most `limit` units each.
fn char_windows(run: &str, limit: usize, counter: &TokenCounter) -> Vec<String> {
    let mut windows = Vec::new();
    let mut rest = run;
    while !rest.is_empty() {
        let mut take = rest.chars().count().min(limit.max(1));
        let mut end = byte_offset(rest, take);
        loop {
            let measured = counter.as_ref()(&rest[..end]);
            if measured <= limit || take == 1 {
                break;
            }
            take = (take * limit / measured).clamp(1, take - 1);
            end = byte_offset(rest, take);
        }
        windows.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    windows
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset)
}

fn character_counter() -> TokenCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

/// Build a token counter for the given provider/model.
///
/// OpenAI models must resolve a tiktoken encoding. Other providers fall back to whitespace
/// tokenization when no encoding matches, logged at `warn`.
pub(crate) fn build_token_counter(
    provider: EmbeddingProvider,
    model: &str,
) -> Result<TokenCounter, ChunkingError> {
    match provider {
        EmbeddingProvider::OpenAI => build_tiktoken_counter(model),
        EmbeddingProvider::Ollama | EmbeddingProvider::Hash => {
            match build_tiktoken_counter(model) {
                Ok(counter) => Ok(counter),
                Err(error) => {
                    tracing::warn!(
                        model,
                        error = %error,
                        "Tokenizer unavailable; falling back to whitespace counter"
                    );
                    Ok(whitespace_counter())
                }
            }
        }
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::warn!(
                    model,
                    "Falling back to 'cl100k_base' encoding for token counting"
                );
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Prefix every chunk after the first with the tail of its predecessor.
///
/// The result never exceeds `chunk_size`; when it would, characters are trimmed from the start.
fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    if chunks.is_empty() || overlap == 0 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut iter = chunks.into_iter();
    let Some(mut previous) = iter.next() else {
        return overlapped;
    };
    overlapped.push(previous.clone());

    for current in iter {
        let mut tail = tail_with_token_limit(&previous, overlap, token_counter);
        let mut combined = join_overlap(tail, &current);
        while !tail.is_empty() && token_counter.as_ref()(&combined) > chunk_size {
            tail = drop_leading_word(tail);
            combined = join_overlap(tail, &current);
        }
        overlapped.push(trim_to_token_budget(&combined, chunk_size, token_counter));
        previous = current;
    }

    overlapped
}

fn join_overlap(tail: &str, current: &str) -> String {
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);
    if !tail.is_empty() {
        combined.push_str(tail);
        if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
            combined.push(' ');
        }
    }
    combined.push_str(current);
    combined
}

/// Longest whitespace-trimmed suffix of `text` that fits in `token_limit`, starting on a word.
///
/// When the cut lands inside a word, the partial word is dropped if the tail holds another
/// word boundary.
fn tail_with_token_limit<'a>(
    text: &'a str,
    token_limit: usize,
    token_counter: &TokenCounter,
) -> &'a str {
    let Some(tail) = shortest_start_within(text, token_limit, token_counter) else {
        return "";
    };
    let cut_mid_word = text[..text.len() - tail.len()]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace());
    if !cut_mid_word {
        return tail;
    }
    match tail.find(char::is_whitespace) {
        Some(offset) if !tail[offset..].trim().is_empty() => tail[offset..].trim_start(),
        _ => tail,
    }
}

/// Drop the first word of `tail`, or its first character when it has no word boundary.
fn drop_leading_word(tail: &str) -> &str {
    match tail.find(char::is_whitespace) {
        Some(offset) => tail[offset..].trim_start(),
        None => {
            let first = tail.chars().next().map_or(0, char::len_utf8);
            &tail[first..]
        }
    }
}

fn trim_to_token_budget(text: &str, token_budget: usize, token_counter: &TokenCounter) -> String {
    shortest_start_within(text, token_budget, token_counter)
        .unwrap_or_default()
        .to_string()
}

/// Walk char boundaries from the front until the trimmed remainder fits `limit`.
fn shortest_start_within<'a>(
    text: &'a str,
    limit: usize,
    token_counter: &TokenCounter,
) -> Option<&'a str> {
    if limit == 0 {
        return None;
    }
    let trimmed_text = text.trim_start();
    if token_counter.as_ref()(trimmed_text) <= limit {
        return Some(trimmed_text);
    }
    text.char_indices()
        .skip(1)
        .map(|(offset, _)| text[offset..].trim_start())
        .find(|candidate| token_counter.as_ref()(candidate) <= limit)
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars()
        .next()
        .map(|c| c.is_whitespace())
        .unwrap_or(false)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars()
        .next_back()
        .map(|c| c.is_whitespace())
        .unwrap_or(false)
}
