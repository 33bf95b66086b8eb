use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{EmbeddingClient, EmbeddingClientError, ensure_non_empty, validate_embeddings};

/// Embeddings via an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    /// Construct a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: String, api_key: String, model: String, dimension: usize) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key,
            model,
            dimension,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        ensure_non_empty(&texts)?;
        let expected = texts.len();
        tracing::debug!(model = %self.model, inputs = expected, "Requesting OpenAI embeddings");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let mut body: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;
        body.data.sort_by_key(|datum| datum.index);
        let vectors = body.data.into_iter().map(|datum| datum.embedding).collect();
        validate_embeddings(vectors, expected, self.dimension)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn orders_vectors_by_index() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            format!("{}/v1", server.base_url()),
            "sk-test".into(),
            "text-embedding-3-small".into(),
            2,
        );
        let vectors = client
            .generate_embeddings(vec!["a".into(), "b".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(401).body("bad key");
            })
            .await;

        let client =
            OpenAiEmbeddingClient::new(server.base_url(), "nope".into(), "m".into(), 2);
        let error = client
            .generate_embeddings(vec!["a".into()])
            .await
            .expect_err("error status");
        assert!(matches!(
            error,
            EmbeddingClientError::GenerationFailed(message) if message.contains("401")
        ));
    }
}
