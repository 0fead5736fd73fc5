use crate::llm::{ModelCallError, ModelCaller, PromptSpec};
use anyhow::ensure;
use serde::Deserialize;

pub const FLOW_NAME: &str = "stockSearchSuggestions";

/// The prompt asks for at most 5; anything extra is truncated, not rejected.
pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct SearchSuggestionRequest {
    search_term: String,
}

impl SearchSuggestionRequest {
    pub fn try_new(search_term: impl Into<String>) -> anyhow::Result<Self> {
        let search_term = search_term.into().trim().to_string();
        ensure!(!search_term.is_empty(), "search term must be non-empty");
        Ok(Self { search_term })
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SearchSuggestionsOutput {
    #[serde(default)]
    suggestions: Vec<String>,
}

fn prompt(req: &SearchSuggestionRequest) -> String {
    format!(
        "You are an AI assistant that provides stock search suggestions based on the user's input.\n\n\
         Return a JSON object with a \"suggestions\" key, which is an array of strings.\n\
         Provide a maximum of {MAX_SUGGESTIONS} suggestions.\n\n\
         Search Term: {}",
        req.search_term
    )
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["suggestions"],
        "properties": {
            "suggestions": {
                "type": "array",
                "maxItems": MAX_SUGGESTIONS,
                "items": {"type": "string"}
            }
        }
    })
}

pub async fn suggest(
    caller: &dyn ModelCaller,
    req: &SearchSuggestionRequest,
) -> Result<Vec<String>, ModelCallError> {
    let value = caller
        .generate_json(PromptSpec {
            name: FLOW_NAME,
            prompt: prompt(req),
            response_schema: response_schema(),
        })
        .await?;

    let raw = value.to_string();
    let output = serde_json::from_value::<SearchSuggestionsOutput>(value).map_err(|e| {
        ModelCallError::schema_mismatch(FLOW_NAME, format!("unexpected output shape: {e}"), Some(raw))
    })?;

    let suggestions: Vec<String> = output
        .suggestions
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect();
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptSpec;
    use serde_json::json;

    struct FixedCaller(Result<serde_json::Value, ModelCallError>);

    #[async_trait::async_trait]
    impl ModelCaller for FixedCaller {
        async fn generate_json(
            &self,
            _spec: PromptSpec,
        ) -> Result<serde_json::Value, ModelCallError> {
            self.0.clone()
        }
    }

    #[test]
    fn rejects_empty_search_term() {
        assert!(SearchSuggestionRequest::try_new("  ").is_err());
    }

    #[tokio::test]
    async fn parses_suggestion_list() {
        let caller = FixedCaller(Ok(json!({"suggestions": ["AAPL", "Apple Inc."]})));
        let req = SearchSuggestionRequest::try_new("AAP").unwrap();
        let suggestions = suggest(&caller, &req).await.unwrap();
        assert_eq!(suggestions, vec!["AAPL", "Apple Inc."]);
    }

    #[tokio::test]
    async fn missing_suggestions_key_reads_as_empty() {
        let caller = FixedCaller(Ok(json!({})));
        let req = SearchSuggestionRequest::try_new("AAP").unwrap();
        assert!(suggest(&caller, &req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncates_to_five_and_drops_blanks() {
        let caller = FixedCaller(Ok(json!({
            "suggestions": ["a", " ", "b", "c", "d", "e", "f"]
        })));
        let req = SearchSuggestionRequest::try_new("xy").unwrap();
        let suggestions = suggest(&caller, &req).await.unwrap();
        assert_eq!(suggestions, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn non_object_output_is_a_schema_mismatch() {
        let caller = FixedCaller(Ok(json!(["AAPL"])));
        let req = SearchSuggestionRequest::try_new("AAP").unwrap();
        let err = suggest(&caller, &req).await.unwrap_err();
        assert_eq!(err.kind, crate::llm::ModelCallErrorKind::SchemaMismatch);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let caller = FixedCaller(Err(ModelCallError::transport(FLOW_NAME, "boom")));
        let req = SearchSuggestionRequest::try_new("AAP").unwrap();
        let err = suggest(&caller, &req).await.unwrap_err();
        assert_eq!(err.kind, crate::llm::ModelCallErrorKind::Transport);
    }
}
