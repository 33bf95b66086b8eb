use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ChatMessage, ChatModel, ChatModelError};

/// Replays canned replies in order and records every prompt it receives.
pub(crate) struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub(crate) fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatModelError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ChatModelError::GenerationFailed("script exhausted".into()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
