use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ChatMessage, ChatModel, ChatModelError};

/// Chat completions via an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatModel {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChatModel {
    /// Construct a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: String, api_key: String, model: String, temperature: f32) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key,
            model,
            temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatModelError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatModelError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatModelError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            ChatModelError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatModelError::InvalidResponse("no choices returned".into()))?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn returns_first_choice_trimmed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .json_body_partial(r#"{"model":"gpt-4o-mini","messages":[{"role":"user","content":"hi"}]}"#);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "  hello \n" } }]
                }));
            })
            .await;

        let model = OpenAiChatModel::new(server.base_url(), "k".into(), "gpt-4o-mini".into(), 0.0);
        let answer = model.complete(&[ChatMessage::user("hi")]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(answer, "hello");
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let model = OpenAiChatModel::new(server.base_url(), "k".into(), "m".into(), 0.0);
        let error = model.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(error, ChatModelError::InvalidResponse(_)));
    }
}
