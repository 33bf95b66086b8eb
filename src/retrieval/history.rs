use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::llm::ChatMessage;

/// In-memory chat transcripts keyed by session id.
///
/// Transcripts live for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct ChatHistoryStore {
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl ChatHistoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the transcript for `session_id`; creates an empty one on first access.
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id, "Created new session history");
                Vec::new()
            })
            .clone()
    }

    /// Append a completed question/answer turn.
    pub async fn record_turn(&self, session_id: &str, question: &str, answer: &str) {
        let mut sessions = self.sessions.lock().await;
        let transcript = sessions.entry(session_id.to_string()).or_default();
        transcript.push(ChatMessage::user(question));
        transcript.push(ChatMessage::assistant(answer));
    }

    /// Drop the transcript for `session_id`.
    pub async fn clear(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }
}
