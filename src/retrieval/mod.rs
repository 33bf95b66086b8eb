//! Retrieval and the conversational RAG chain.

mod chain;
mod history;
mod retriever;

use thiserror::Error;

use crate::embedding::EmbeddingClientError;
use crate::index::IndexError;
use crate::llm::ChatModelError;
use crate::prompts::PromptError;

pub use chain::{ConversationalRag, RagAnswer};
pub use history::ChatHistoryStore;
pub use retriever::{DEFAULT_TOP_K, Retriever, format_docs};

/// Errors raised while retrieving context or running the chain.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Chain was invoked before a retriever was attached.
    #[error("retriever has not been initialized; ingest documents or load an index first")]
    MissingRetriever,
    /// Question was blank.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// Query embedding failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Index lookup or loading failed.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Chat model call failed.
    #[error(transparent)]
    Model(#[from] ChatModelError),
    /// Prompt could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}
