use crate::llm::{ModelCallError, ModelCaller, PromptSpec};
use anyhow::ensure;
use serde::Deserialize;

pub const FLOW_NAME: &str = "promptSuggestions";

/// The contract is exactly three prompts; any other count is a violation.
pub const PROMPT_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct PromptSuggestionRequest {
    stock_segment: String,
}

impl PromptSuggestionRequest {
    pub fn try_new(stock_segment: impl Into<String>) -> anyhow::Result<Self> {
        let stock_segment = stock_segment.into().trim().to_string();
        ensure!(!stock_segment.is_empty(), "stock segment must be non-empty");
        Ok(Self { stock_segment })
    }

    pub fn stock_segment(&self) -> &str {
        &self.stock_segment
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PromptSuggestionsOutput {
    #[serde(default)]
    suggestions: Vec<String>,
}

fn prompt(req: &PromptSuggestionRequest) -> String {
    format!(
        "You are an AI assistant designed to provide prompt suggestions for stock analysis.\n\n\
         Based on the stock segment provided by the user, suggest three prompts that can be used for in-depth analysis.\n\
         The prompts should be diverse and cover different aspects of the stock segment.\n\
         Format each prompt suggestion as a concise and clear question or instruction.\n\n\
         Stock Segment: {}\n\n\
         Suggestions:",
        req.stock_segment
    )
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["suggestions"],
        "properties": {
            "suggestions": {
                "type": "array",
                "minItems": PROMPT_COUNT,
                "maxItems": PROMPT_COUNT,
                "items": {"type": "string"}
            }
        }
    })
}

pub async fn suggest(
    caller: &dyn ModelCaller,
    req: &PromptSuggestionRequest,
) -> Result<Vec<String>, ModelCallError> {
    let value = caller
        .generate_json(PromptSpec {
            name: FLOW_NAME,
            prompt: prompt(req),
            response_schema: response_schema(),
        })
        .await?;

    let raw = value.to_string();
    let output = serde_json::from_value::<PromptSuggestionsOutput>(value).map_err(|e| {
        ModelCallError::schema_mismatch(FLOW_NAME, format!("unexpected output shape: {e}"), Some(raw.clone()))
    })?;

    if output.suggestions.len() != PROMPT_COUNT {
        return Err(ModelCallError::schema_mismatch(
            FLOW_NAME,
            format!(
                "expected exactly {PROMPT_COUNT} prompt suggestions (got {})",
                output.suggestions.len()
            ),
            Some(raw),
        ));
    }

    Ok(output.suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelCallErrorKind, PromptSpec};
    use serde_json::json;

    struct FixedCaller(serde_json::Value);

    #[async_trait::async_trait]
    impl ModelCaller for FixedCaller {
        async fn generate_json(
            &self,
            _spec: PromptSpec,
        ) -> Result<serde_json::Value, ModelCallError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn accepts_exactly_three_prompts() {
        let caller = FixedCaller(json!({
            "suggestions": [
                "What are the growth drivers?",
                "Compare valuation to peers.",
                "Summarize recent earnings."
            ]
        }));
        let req = PromptSuggestionRequest::try_new("Technology").unwrap();
        let suggestions = suggest(&caller, &req).await.unwrap();
        assert_eq!(suggestions.len(), PROMPT_COUNT);
    }

    #[tokio::test]
    async fn rejects_wrong_prompt_count() {
        let caller = FixedCaller(json!({"suggestions": ["only", "two"]}));
        let req = PromptSuggestionRequest::try_new("Technology").unwrap();
        let err = suggest(&caller, &req).await.unwrap_err();
        assert_eq!(err.kind, ModelCallErrorKind::SchemaMismatch);
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(PromptSuggestionRequest::try_new("").is_err());
    }
}
