//! Umbrella error returned by the HTTP and CLI surfaces.

use std::error::Error as _;

use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::config::ConfigError;
use crate::index::IndexError;
use crate::ingestion::IngestionError;
use crate::loader::LoaderError;
use crate::processing::ChunkingError;
use crate::retrieval::RetrievalError;
use crate::session::SessionError;

/// Any failure of a document pipeline operation.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Caller supplied malformed or missing input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Session handling failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Document could not be saved or parsed.
    #[error(transparent)]
    Loader(#[from] LoaderError),
    /// Splitter configuration was rejected.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// Index persistence failed.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Ingestion failed.
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    /// Retrieval or answering failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    /// Analysis or comparison failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Coarse classification used to pick an HTTP status or exit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself was at fault.
    BadRequest,
    /// A referenced session or index does not exist.
    NotFound,
    /// Anything else.
    Internal,
}

impl DocumentError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput(_) | Self::Chunking(_) => ErrorClass::BadRequest,
            Self::Config(_) => ErrorClass::Internal,
            Self::Session(error) => session_class(error),
            Self::Loader(error) => loader_class(error),
            Self::Index(error) => index_class(error),
            Self::Ingestion(error) => match error {
                IngestionError::NoValidDocuments | IngestionError::NoText => ErrorClass::BadRequest,
                IngestionError::Session(error) => session_class(error),
                IngestionError::Loader(error) => loader_class(error),
                IngestionError::Chunking(_) => ErrorClass::BadRequest,
                IngestionError::Index(error) => index_class(error),
            },
            Self::Retrieval(error) => match error {
                RetrievalError::EmptyQuestion => ErrorClass::BadRequest,
                RetrievalError::MissingRetriever => ErrorClass::NotFound,
                RetrievalError::Index(error) => index_class(error),
                _ => ErrorClass::Internal,
            },
            Self::Analysis(AnalysisError::EmptyInput) => ErrorClass::BadRequest,
            Self::Analysis(_) => ErrorClass::Internal,
        }
    }

    /// Message followed by every underlying cause, joined with `": "`.
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !report.ends_with(&text) {
                report.push_str(": ");
                report.push_str(&text);
            }
            source = cause.source();
        }
        report
    }
}

fn session_class(error: &SessionError) -> ErrorClass {
    match error {
        SessionError::InvalidId(_) => ErrorClass::BadRequest,
        SessionError::Io { .. } => ErrorClass::Internal,
    }
}

fn loader_class(error: &LoaderError) -> ErrorClass {
    match error {
        LoaderError::Io { .. } | LoaderError::Join(_) => ErrorClass::Internal,
        _ => ErrorClass::BadRequest,
    }
}

fn index_class(error: &IndexError) -> ErrorClass {
    match error {
        IndexError::NotFound(_) => ErrorClass::NotFound,
        IndexError::ModelMismatch { .. } | IndexError::DimensionMismatch { .. } => {
            ErrorClass::BadRequest
        }
        _ => ErrorClass::Internal,
    }
}
