use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::embedding::SharedEmbeddingClient;
use crate::index::ScoredChunk;
use crate::llm::{ChatMessage, SharedChatModel};
use crate::prompts::{PromptType, prompt};

use super::{ChatHistoryStore, RetrievalError, Retriever, format_docs};

/// Result of one pass through the chain.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    /// Model answer; may be empty when the model returned nothing.
    pub answer: String,
    /// Question actually used for retrieval.
    pub standalone_question: String,
    /// Retrieved context, best first.
    pub sources: Vec<ScoredChunk>,
}

/// History-aware retrieval chain: rewrite, retrieve, answer.
pub struct ConversationalRag {
    session_id: String,
    retriever: Option<Retriever>,
    llm: SharedChatModel,
    history: Arc<ChatHistoryStore>,
}

impl ConversationalRag {
    /// Chain over an existing retriever.
    pub fn new(session_id: impl Into<String>, retriever: Retriever, llm: SharedChatModel) -> Self {
        let session_id = session_id.into();
        tracing::info!(
            session_id = %session_id,
            model = llm.model_name(),
            "ConversationalRag initialized"
        );
        Self {
            session_id,
            retriever: Some(retriever),
            llm,
            history: Arc::new(ChatHistoryStore::new()),
        }
    }

    /// Chain whose retriever will be loaded later with [`Self::load_retriever_from_index`].
    pub fn without_retriever(session_id: impl Into<String>, llm: SharedChatModel) -> Self {
        Self {
            session_id: session_id.into(),
            retriever: None,
            llm,
            history: Arc::new(ChatHistoryStore::new()),
        }
    }

    /// Share a transcript store across chains (one chain per request, one store per process).
    pub fn with_history_store(mut self, history: Arc<ChatHistoryStore>) -> Self {
        self.history = history;
        self
    }

    /// Session this chain answers for.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Load a persisted index from `dir` and use it for retrieval.
    pub async fn load_retriever_from_index(
        &mut self,
        dir: &Path,
        embedder: SharedEmbeddingClient,
        k: usize,
    ) -> Result<&Retriever, RetrievalError> {
        let retriever = Retriever::from_index_dir(dir, embedder, k)
            .await
            .inspect_err(|error| {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %error,
                    "Error loading retriever from index"
                );
            })?;
        tracing::info!(
            index_path = %dir.display(),
            session_id = %self.session_id,
            entries = retriever.len(),
            "Retriever loaded from index"
        );
        Ok(self.retriever.insert(retriever))
    }

    /// Answer `input` with caller-owned history (multi-document chat).
    pub async fn invoke(
        &self,
        input: &str,
        chat_history: Option<&[ChatMessage]>,
    ) -> Result<RagAnswer, RetrievalError> {
        let history = chat_history.unwrap_or_default();
        let result = self.run(input, history).await;
        match &result {
            Ok(answer) => {
                tracing::info!(
                    session_id = %self.session_id,
                    user_input = input,
                    answer_preview = preview(&answer.answer),
                    "Chain invoked successfully"
                );
            }
            Err(error) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %error,
                    "Error invoking ConversationalRag"
                );
            }
        }
        result
    }

    /// Answer `input` using and extending the transcript stored for this session
    /// (single-document chat).
    pub async fn invoke_with_session_history(
        &self,
        input: &str,
    ) -> Result<RagAnswer, RetrievalError> {
        let history = self.history.history(&self.session_id).await;
        let answer = self.invoke(input, Some(&history)).await?;
        self.history
            .record_turn(&self.session_id, input, &answer.answer)
            .await;
        Ok(answer)
    }

    async fn run(&self, input: &str, history: &[ChatMessage]) -> Result<RagAnswer, RetrievalError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RetrievalError::EmptyQuestion);
        }
        let retriever = self
            .retriever
            .as_ref()
            .ok_or(RetrievalError::MissingRetriever)?;

        let standalone_question = self.rewrite(input, history).await?;
        let sources = retriever.retrieve(&standalone_question).await?;
        let context = format_docs(&sources);

        let vars = HashMap::from([("context", context.as_str()), ("input", input)]);
        let messages = prompt(PromptType::ContextQa).render(&vars, history)?;
        let answer = self.llm.complete(&messages).await?;
        if answer.is_empty() {
            tracing::warn!(
                session_id = %self.session_id,
                user_input = input,
                "No answer generated"
            );
        }

        Ok(RagAnswer {
            answer,
            standalone_question,
            sources,
        })
    }

    /// Reformulate `input` as a standalone question. Without history there is nothing to
    /// resolve, so the model is not called.
    async fn rewrite(
        &self,
        input: &str,
        history: &[ChatMessage],
    ) -> Result<String, RetrievalError> {
        if history.is_empty() {
            return Ok(input.to_string());
        }
        let vars = HashMap::from([("input", input)]);
        let messages = prompt(PromptType::ContextualizeQuestion).render(&vars, history)?;
        let rewritten = self.llm.complete(&messages).await?;
        if rewritten.is_empty() {
            tracing::warn!(
                session_id = %self.session_id,
                "Question rewrite was empty; using original input"
            );
            return Ok(input.to_string());
        }
        tracing::debug!(session_id = %self.session_id, rewritten = %rewritten, "Rewrote question");
        Ok(rewritten)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(150).collect()
}
