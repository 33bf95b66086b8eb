//! Structured document analysis and comparison driven by the chat model.

mod analyzer;
mod comparator;
mod repair;

use thiserror::Error;

use crate::llm::ChatModelError;
use crate::prompts::PromptError;

pub use analyzer::{DocumentAnalyzer, DocumentMetadata, PageCount};
pub use comparator::{DocumentComparator, PageChange};

/// Errors raised by analysis and comparison.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Input text was blank.
    #[error("document text is empty")]
    EmptyInput,
    /// Chat model call failed.
    #[error(transparent)]
    Model(#[from] ChatModelError),
    /// Prompt could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// Model output did not match the expected schema, even after one repair attempt.
    #[error("model output could not be parsed: {message}")]
    InvalidOutput {
        /// Deserialization error.
        message: String,
        /// Last output received.
        raw: String,
    },
}
