//! Turning free-form model output into typed values.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::llm::ChatModel;
use crate::prompts::{PromptType, prompt};

use super::AnalysisError;

/// Pretty-printed JSON schema for `T`, used as the prompt's format instructions.
pub(crate) fn format_instructions<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

/// Locate the first JSON object or array in `raw`, skipping code fences and surrounding prose.
pub(crate) fn extract_json(raw: &str) -> Option<Value> {
    let mut rest = raw;
    while let Some(offset) = rest.find(['{', '[']) {
        let candidate = &rest[offset..];
        let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }
        rest = &candidate[1..];
    }
    None
}

/// Deserialize `raw` into `T` without calling the model.
pub(crate) fn parse_output<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let value = extract_json(raw).ok_or_else(|| "no JSON value found in output".to_string())?;
    serde_json::from_value(value).map_err(|error| error.to_string())
}

/// Parse `raw` as `T`; on failure ask the model once to fix its output and parse again.
pub(crate) async fn parse_with_repair<T>(
    llm: &dyn ChatModel,
    raw: &str,
    instructions: &str,
) -> Result<T, AnalysisError>
where
    T: DeserializeOwned,
{
    let error = match parse_output(raw) {
        Ok(value) => return Ok(value),
        Err(error) => error,
    };
    tracing::warn!(error = %error, "Model output failed to parse; requesting a fix");

    let vars = HashMap::from([
        ("format_instructions", instructions),
        ("completion", raw),
        ("error", error.as_str()),
    ]);
    let messages = prompt(PromptType::OutputFixing).render(&vars, &[])?;
    let fixed = llm.complete(&messages).await?;

    parse_output(&fixed).map_err(|message| {
        tracing::error!(error = %message, "Model output still invalid after repair");
        AnalysisError::InvalidOutput { message, raw: fixed }
    })
}
