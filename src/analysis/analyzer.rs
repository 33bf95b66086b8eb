use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::llm::SharedChatModel;
use crate::prompts::{PromptType, prompt};

use super::AnalysisError;
use super::repair::{format_instructions, parse_with_repair};

/// Page count as reported by the model: a number, or text such as "Not Available".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PageCount {
    /// Numeric page count.
    Count(u64),
    /// Free-form value.
    Text(String),
}

/// Summary and bibliographic metadata extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentMetadata {
    /// Key points, one per entry.
    pub summary: Vec<String>,
    /// Document title.
    pub title: String,
    /// Authors.
    pub author: Vec<String>,
    /// Creation date as written in the document.
    pub date_created: String,
    /// Last modification date as written in the document.
    pub last_modified_date: String,
    /// Publisher.
    pub publisher: String,
    /// Primary language.
    pub language: String,
    /// Page count.
    pub page_count: PageCount,
    /// Overall tone.
    pub sentiment_tone: String,
}

/// Extracts [`DocumentMetadata`] from document text.
pub struct DocumentAnalyzer {
    llm: SharedChatModel,
    format_instructions: String,
}

impl DocumentAnalyzer {
    /// Analyzer backed by `llm`.
    pub fn new(llm: SharedChatModel) -> Self {
        tracing::info!(model = llm.model_name(), "DocumentAnalyzer initialized");
        Self {
            llm,
            format_instructions: format_instructions::<DocumentMetadata>(),
        }
    }

    /// Summarize `document_text` and extract its metadata.
    pub async fn analyze_document(
        &self,
        document_text: &str,
    ) -> Result<DocumentMetadata, AnalysisError> {
        if document_text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let vars = HashMap::from([
            ("format_instructions", self.format_instructions.as_str()),
            ("document_text", document_text),
        ]);
        let messages = prompt(PromptType::DocumentAnalysis).render(&vars, &[])?;
        let raw = self.llm.complete(&messages).await?;
        let metadata: DocumentMetadata =
            parse_with_repair(self.llm.as_ref(), &raw, &self.format_instructions)
                .await
                .inspect_err(|error| tracing::error!(error = %error, "Metadata analysis failed"))?;
        tracing::info!(
            title = %metadata.title,
            summary_points = metadata.summary.len(),
            "Metadata extraction successful"
        );
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedModel;

    const REPLY: &str = r#"```json
{
  "Summary": ["Quarterly revenue grew."],
  "Title": "Q3 Report",
  "Author": ["Finance Team"],
  "DateCreated": "2024-10-01",
  "LastModifiedDate": "2024-10-05",
  "Publisher": "Acme",
  "Language": "English",
  "PageCount": 12,
  "SentimentTone": "Positive"
}
```"#;

    #[tokio::test]
    async fn parses_fenced_metadata() {
        let model = ScriptedModel::new(&[REPLY]);
        let analyzer = DocumentAnalyzer::new(model.clone());
        let metadata = analyzer.analyze_document("--- Page 1 ---\nRevenue grew.").await.unwrap();

        assert_eq!(metadata.title, "Q3 Report");
        assert_eq!(metadata.page_count, PageCount::Count(12));
        let calls = model.calls();
        assert!(calls[0][0].content.contains("SentimentTone"));
        assert!(calls[0][1].content.contains("Revenue grew."));
    }

    #[tokio::test]
    async fn textual_page_count_is_accepted() {
        let reply = REPLY.replace("12", "\"Not Available\"");
        let model = ScriptedModel::new(&[reply.as_str()]);
        let metadata = DocumentAnalyzer::new(model)
            .analyze_document("text")
            .await
            .unwrap();
        assert_eq!(metadata.page_count, PageCount::Text("Not Available".into()));
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_model_call() {
        let model = ScriptedModel::new(&[]);
        let analyzer = DocumentAnalyzer::new(model.clone());
        assert!(matches!(
            analyzer.analyze_document("  ").await,
            Err(AnalysisError::EmptyInput)
        ));
        assert!(model.calls().is_empty());
    }

    #[test]
    fn serializes_with_pascal_case_keys() {
        let metadata = DocumentMetadata {
            summary: vec![],
            title: "t".into(),
            author: vec![],
            date_created: "d".into(),
            last_modified_date: "m".into(),
            publisher: "p".into(),
            language: "l".into(),
            page_count: PageCount::Count(1),
            sentiment_tone: "s".into(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["LastModifiedDate"], "m");
        assert_eq!(json["PageCount"], 1);
    }
}
