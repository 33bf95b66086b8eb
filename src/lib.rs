#![deny(missing_docs)]

//! Core library for the document portal: document analysis, comparison, and retrieval-augmented
//! chat over uploaded files.

/// Structured analysis and comparison through the chat model.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Umbrella error for the outer surfaces.
pub mod error;
/// Flat vector index with on-disk persistence.
pub mod index;
/// Session-scoped ingestion for each portal mode.
pub mod ingestion;
/// Chat model abstraction and adapters.
pub mod llm;
/// Saving uploads and extracting text from PDF, DOCX and plain-text files.
pub mod loader;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Text splitting utilities.
pub mod processing;
/// Prompt registry.
pub mod prompts;
/// Retrieval and the conversational chain.
pub mod retrieval;
/// Portal service shared by the HTTP and CLI surfaces.
pub mod service;
/// Session identifiers and directories.
pub mod session;
