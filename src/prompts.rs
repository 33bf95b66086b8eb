//! Prompt registry.
//!
//! Templates use `{name}` placeholders. Rendering is a single pass over the template, so
//! substituted values (which may themselves contain braces, e.g. JSON schemas) are never
//! re-scanned.

use std::collections::HashMap;

use thiserror::Error;

use crate::llm::ChatMessage;

/// Errors raised while rendering a prompt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    /// Template referenced a variable the caller did not supply.
    #[error("missing prompt variable '{0}'")]
    MissingVariable(String),
}

/// Prompts known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptType {
    /// Summary and metadata extraction for one document.
    DocumentAnalysis,
    /// Page-wise comparison of a reference and an actual document.
    DocumentComparison,
    /// Rewrite the latest question into a standalone one using chat history.
    ContextualizeQuestion,
    /// Answer a question from retrieved context.
    ContextQa,
    /// Ask the model to repair output that failed to parse.
    OutputFixing,
}

impl PromptType {
    /// Registry key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentAnalysis => "document_analysis",
            Self::DocumentComparison => "document_comparison",
            Self::ContextualizeQuestion => "contextualize_question",
            Self::ContextQa => "context_qa",
            Self::OutputFixing => "output_fixing",
        }
    }
}

/// A system template, an optional history slot, and a user template.
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt {
    /// Template for the leading system message.
    pub system: &'static str,
    /// Whether prior turns are inserted between the system and user messages.
    pub with_history: bool,
    /// Template for the final user message.
    pub human: &'static str,
}

const DOCUMENT_ANALYSIS_SYSTEM: &str = "You are a highly capable assistant trained to analyze and summarize documents.
Return ONLY valid JSON matching the exact schema below. Do not wrap it in prose.

{format_instructions}";

const DOCUMENT_ANALYSIS_HUMAN: &str = "Analyze this document:

{document_text}";

const DOCUMENT_COMPARISON_SYSTEM: &str = "You will be provided with content from two PDFs. Your tasks are as follows:

1. Compare the content in the two PDFs.
2. Identify the differences and note down the page number.
3. The output you provide must be page wise comparison content.
4. If any page does not contain any change, mention it as 'NO CHANGE'.

Return ONLY a JSON array matching this schema:

{format_instructions}";

const DOCUMENT_COMPARISON_HUMAN: &str = "Input documents:

{combined_docs}";

const CONTEXTUALIZE_QUESTION_SYSTEM: &str = "Given a conversation history and the most recent user query, rewrite the query as a standalone question that makes sense without relying on the previous context. Do not provide an answer. Only reformulate the question if necessary; otherwise, return it unchanged.";

const CONTEXT_QA_SYSTEM: &str = "You are an assistant designed to answer questions using the provided context. Rely only on the retrieved information to form your response. If the answer is not found in the context, respond with \"I don't know.\" Keep your answer concise and no longer than three sentences.

{context}";

const OUTPUT_FIXING_SYSTEM: &str = "Your previous reply could not be parsed. Rewrite it so it is valid JSON matching this schema, and return only the JSON:

{format_instructions}";

const OUTPUT_FIXING_HUMAN: &str = "Reply:
{completion}

Error:
{error}";

const INPUT_ONLY: &str = "{input}";

/// Look up the template for a prompt.
pub fn prompt(kind: PromptType) -> ChatPrompt {
    match kind {
        PromptType::DocumentAnalysis => ChatPrompt {
            system: DOCUMENT_ANALYSIS_SYSTEM,
            with_history: false,
            human: DOCUMENT_ANALYSIS_HUMAN,
        },
        PromptType::DocumentComparison => ChatPrompt {
            system: DOCUMENT_COMPARISON_SYSTEM,
            with_history: false,
            human: DOCUMENT_COMPARISON_HUMAN,
        },
        PromptType::ContextualizeQuestion => ChatPrompt {
            system: CONTEXTUALIZE_QUESTION_SYSTEM,
            with_history: true,
            human: INPUT_ONLY,
        },
        PromptType::ContextQa => ChatPrompt {
            system: CONTEXT_QA_SYSTEM,
            with_history: true,
            human: INPUT_ONLY,
        },
        PromptType::OutputFixing => ChatPrompt {
            system: OUTPUT_FIXING_SYSTEM,
            with_history: false,
            human: OUTPUT_FIXING_HUMAN,
        },
    }
}

impl ChatPrompt {
    /// Render into chat messages. `history` is ignored for prompts without a history slot.
    pub fn render(
        &self,
        vars: &HashMap<&str, &str>,
        history: &[ChatMessage],
    ) -> Result<Vec<ChatMessage>, PromptError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(fill(self.system, vars)?));
        if self.with_history {
            messages.extend_from_slice(history);
        }
        messages.push(ChatMessage::user(fill(self.human, vars)?));
        Ok(messages)
    }
}

/// Substitute `{name}` placeholders. Braces not enclosing an identifier are kept verbatim.
pub fn fill(template: &str, vars: &HashMap<&str, &str>) -> Result<String, PromptError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let is_placeholder = name_len > 0 && after[name_len..].starts_with('}');
        if is_placeholder {
            let name = &after[..name_len];
            let value = vars
                .get(name)
                .ok_or_else(|| PromptError::MissingVariable(name.to_string()))?;
            output.push_str(value);
            rest = &after[name_len + 1..];
        } else {
            output.push('{');
            rest = after;
        }
    }
    output.push_str(rest);
    Ok(output)
}
