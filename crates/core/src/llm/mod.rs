pub mod error;
pub mod gemini;
pub mod json;

pub use error::{ModelCallError, ModelCallErrorKind};

/// One templated generation request: a named prompt plus the JSON schema the
/// response must conform to.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub name: &'static str,
    pub prompt: String,
    pub response_schema: serde_json::Value,
}

#[async_trait::async_trait]
pub trait ModelCaller: Send + Sync {
    /// Runs one generation round-trip and returns the response body parsed
    /// as JSON. Schema conformance beyond "is valid JSON" is the caller's
    /// concern.
    async fn generate_json(&self, spec: PromptSpec) -> Result<serde_json::Value, ModelCallError>;
}
