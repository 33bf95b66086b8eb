//! Chat model abstraction used for question rewriting, answering and document analysis.
//!
//! Both adapters issue plain HTTP requests: the OpenAI adapter targets any server exposing
//! `/chat/completions`, the Ollama adapter targets `/api/chat` with streaming disabled.

mod ollama;
mod openai;
#[cfg(test)]
pub(crate) mod scripted;

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use ollama::OllamaChatModel;
pub use openai::OpenAiChatModel;

/// Errors surfaced while calling a chat model.
#[derive(Debug, Error)]
pub enum ChatModelError {
    /// Provider could not be reached.
    #[error("Chat model provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Interface implemented by chat completion providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation and return the assistant's text, trimmed.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatModelError>;

    /// Model identifier for logs.
    fn model_name(&self) -> &str;
}

/// Shared handle to a chat model.
pub type SharedChatModel = Arc<dyn ChatModel>;

/// Build the chat model described by the configuration.
pub fn get_chat_model(config: &Config) -> SharedChatModel {
    tracing::debug!(
        provider = ?config.llm_provider,
        model = %config.llm_model,
        "Initializing chat model"
    );
    match config.llm_provider {
        LlmProvider::OpenAI => Arc::new(OpenAiChatModel::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
            config.llm_model.clone(),
            config.llm_temperature,
        )),
        LlmProvider::Ollama => Arc::new(OllamaChatModel::new(
            config.ollama_url.clone(),
            config.llm_model.clone(),
            config.llm_temperature,
        )),
    }
}
