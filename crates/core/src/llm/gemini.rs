use crate::config::Settings;
use crate::llm::error::ModelCallError;
use crate::llm::json;
use crate::llm::{ModelCaller, PromptSpec};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const RESPONSE_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_output_tokens = std::env::var("GEMINI_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);

        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_output_tokens,
        })
    }

    async fn generate_content(
        &self,
        flow: &'static str,
        req: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ModelCallError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| ModelCallError::transport(flow, "invalid GEMINI_API_KEY header value"))?;
        headers.insert("x-goog-api-key", key);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| ModelCallError::transport(flow, format!("Gemini request failed: {e}")))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            ModelCallError::transport(flow, format!("failed to read Gemini response body: {e}"))
        })?;
        if !status.is_success() {
            return Err(ModelCallError {
                kind: crate::llm::ModelCallErrorKind::Transport,
                flow,
                detail: format!("status={status}"),
                raw_output: Some(text),
            });
        }

        serde_json::from_str::<GenerateContentResponse>(&text).map_err(|e| {
            ModelCallError::transport(
                flow,
                format!("failed to decode Gemini response envelope: {e}"),
            )
        })
    }

    fn response_text(res: &GenerateContentResponse) -> String {
        let mut out = String::new();
        for candidate in &res.candidates {
            for part in &candidate.content.parts {
                if let Part::Text { text } = part {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
            }
        }
        out
    }
}

#[async_trait::async_trait]
impl ModelCaller for GeminiClient {
    async fn generate_json(&self, spec: PromptSpec) -> Result<serde_json::Value, ModelCallError> {
        let req = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text { text: spec.prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: RESPONSE_MIME_TYPE,
                response_schema: Some(spec.response_schema),
                max_output_tokens: self.max_output_tokens,
            },
        };

        let res = self.generate_content(spec.name, req).await?;

        if let Some(reason) = res
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            if reason != "STOP" {
                tracing::warn!(flow = spec.name, finish_reason = reason, "Gemini candidate did not finish cleanly");
            }
        }

        let text = Self::response_text(&res);
        // Constrained decoding should return bare JSON, but fenced output
        // still shows up; strip it before parsing.
        let json_str = json::extract_json(&text).unwrap_or_else(|| text.trim().to_string());
        serde_json::from_str::<serde_json::Value>(&json_str).map_err(|e| {
            ModelCallError::schema_mismatch(
                spec.name,
                format!("Gemini output is not valid JSON: {e}"),
                Some(text),
            )
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,

    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,

    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,

    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: CandidateContent,

    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_candidate_text_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "{\"suggestions\":"},
                        {"text": "[\"AAPL\"]}"}
                    ],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        });

        let res: GenerateContentResponse = serde_json::from_value(body).unwrap();
        let text = GeminiClient::response_text(&res);
        assert_eq!(text, "{\"suggestions\":\n[\"AAPL\"]}");
    }

    #[test]
    fn decodes_empty_candidates() {
        let res: GenerateContentResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(GeminiClient::response_text(&res).is_empty());
    }
}
