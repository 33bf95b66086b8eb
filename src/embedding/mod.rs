//! Embedding client abstraction and provider adapters.

mod hash;
mod ollama;
mod openai;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use hash::HashEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider response could not be parsed or had the wrong shape.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Identifier of the model producing the vectors; persisted with indexes.
    fn model_name(&self) -> &str;

    /// Expected vector length.
    fn dimension(&self) -> usize;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let mut vectors = self.generate_embeddings(vec![text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            EmbeddingClientError::InvalidResponse("provider returned no vectors".to_string())
        })
    }
}

/// Shared handle to an embedding backend.
pub type SharedEmbeddingClient = Arc<dyn EmbeddingClient>;

/// Check provider output against the request: one vector per text, each of `dimension` length.
pub(crate) fn validate_embeddings(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected_count} vectors, got {}",
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension) {
        return Err(EmbeddingClientError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

pub(crate) fn ensure_non_empty(texts: &[String]) -> Result<(), EmbeddingClientError> {
    if texts.is_empty() {
        return Err(EmbeddingClientError::GenerationFailed(
            "no texts provided".to_string(),
        ));
    }
    Ok(())
}

/// Build an embedding client suitable for the configuration.
pub fn get_embedding_client(config: &Config) -> SharedEmbeddingClient {
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Initializing embedding client"
    );
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAiEmbeddingClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
            config.embedding_model.clone(),
            config.embedding_dimension,
        )),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
        )),
        EmbeddingProvider::Hash => Arc::new(HashEmbeddingClient::new(config.embedding_dimension)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_embeddings_checks_count_and_dimension() {
        assert!(validate_embeddings(vec![vec![0.0; 3]], 1, 3).is_ok());
        assert!(matches!(
            validate_embeddings(vec![vec![0.0; 3]], 2, 3),
            Err(EmbeddingClientError::InvalidResponse(_))
        ));
        assert!(matches!(
            validate_embeddings(vec![vec![0.0; 4]], 1, 3),
            Err(EmbeddingClientError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }
}
