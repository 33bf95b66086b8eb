use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::llm::SharedChatModel;
use crate::prompts::{PromptType, prompt};

use super::AnalysisError;
use super::repair::{format_instructions, parse_with_repair};

/// Differences found on one page. `changes` is `"NO CHANGE"` for identical pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PageChange {
    /// Page label.
    pub page: String,
    /// Description of what changed.
    pub changes: String,
}

/// Page-wise comparison of a reference and an actual document.
pub struct DocumentComparator {
    llm: SharedChatModel,
    format_instructions: String,
}

impl DocumentComparator {
    /// Comparator backed by `llm`.
    pub fn new(llm: SharedChatModel) -> Self {
        tracing::info!(model = llm.model_name(), "DocumentComparator initialized");
        Self {
            llm,
            format_instructions: format_instructions::<Vec<PageChange>>(),
        }
    }

    /// Compare the documents in `combined_docs` (as produced by combining a session's PDFs).
    pub async fn compare_documents(
        &self,
        combined_docs: &str,
    ) -> Result<Vec<PageChange>, AnalysisError> {
        if combined_docs.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let vars = HashMap::from([
            ("format_instructions", self.format_instructions.as_str()),
            ("combined_docs", combined_docs),
        ]);
        let messages = prompt(PromptType::DocumentComparison).render(&vars, &[])?;
        let raw = self.llm.complete(&messages).await?;
        let rows: Vec<PageChange> =
            parse_with_repair(self.llm.as_ref(), &raw, &self.format_instructions)
                .await
                .inspect_err(|error| tracing::error!(error = %error, "Error comparing documents"))?;
        tracing::info!(rows = rows.len(), "Documents compared");
        Ok(rows)
    }
}
