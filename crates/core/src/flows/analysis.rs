use crate::domain::analysis::{StockAnalysis, StrategyKind, StrategySection};
use crate::llm::{ModelCallError, ModelCaller, PromptSpec};
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const FLOW_NAME: &str = "stockAnalysis";

#[derive(Debug, Clone)]
pub struct StockAnalysisRequest {
    ticker: String,
}

impl StockAnalysisRequest {
    pub fn try_new(ticker: impl Into<String>) -> anyhow::Result<Self> {
        let ticker = ticker.into().trim().to_string();
        ensure!(!ticker.is_empty(), "ticker must be non-empty");
        Ok(Self { ticker })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }
}

/// Wire shape of the model's analysis output, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAnalysisOutput {
    pub overall_analysis: String,
    pub overall_color_code: String,
    pub strategies: Vec<StrategySectionOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySectionOutput {
    pub title: String,
    pub content: String,
    pub color_code: String,
}

impl StockAnalysisOutput {
    /// Enforces the contract: exactly one section per strategy category,
    /// non-empty narratives and color codes. Sections are reordered into
    /// `StrategyKind::ALL` order; a missing, duplicate, or unknown category
    /// fails the whole analysis.
    pub fn validate_and_into_analysis(self, ticker: &str) -> anyhow::Result<StockAnalysis> {
        let overall_analysis = self.overall_analysis.trim().to_string();
        ensure!(!overall_analysis.is_empty(), "overall analysis must be non-empty");

        let overall_color_code = self.overall_color_code.trim().to_string();
        ensure!(
            !overall_color_code.is_empty(),
            "overall color code must be non-empty"
        );

        ensure!(
            self.strategies.len() == StrategyKind::ALL.len(),
            "analysis must contain exactly {} strategy sections (got {})",
            StrategyKind::ALL.len(),
            self.strategies.len()
        );

        let mut seen = BTreeSet::<StrategyKind>::new();
        let mut sections = Vec::with_capacity(self.strategies.len());
        for section in self.strategies {
            let Some(kind) = StrategyKind::from_title(&section.title) else {
                bail!("unknown strategy section title: {:?}", section.title);
            };
            ensure!(seen.insert(kind), "duplicate strategy section: {kind}");

            let content = section.content.trim().to_string();
            ensure!(!content.is_empty(), "strategy {kind} content must be non-empty");

            let color_code = section.color_code.trim().to_string();
            ensure!(
                !color_code.is_empty(),
                "strategy {kind} color code must be non-empty"
            );

            sections.push(StrategySection {
                kind,
                content,
                color_code,
            });
        }

        // All six present and unique at this point; normalize the order.
        sections.sort_by_key(|s| s.kind);

        Ok(StockAnalysis {
            ticker: ticker.to_string(),
            overall_analysis,
            overall_color_code,
            strategies: sections,
        })
    }
}

fn prompt(req: &StockAnalysisRequest) -> String {
    let categories = StrategyKind::ALL
        .map(StrategyKind::title)
        .join(", ");
    format!(
        "You are an AI assistant providing stock analysis.\n\n\
         Analyze the stock with ticker symbol {ticker} and provide an AI-driven analysis of the stock's performance.\n\n\
         Provide an overall analysis and an overall color code (a valid CSS color value, e.g. \"green\", \"#00FF00\", \"rgba(0, 255, 0, 1)\") indicating the stock's performance, ranging from green (positive) to red (negative).\n\n\
         Then provide one strategy section for each of the following categories: {categories}.\n\
         The response MUST include all {count} strategy sections; none are optional.\n\
         Each section has a title (the category name), a content narrative, and its own color code independent of the overall color code.",
        ticker = req.ticker,
        count = StrategyKind::ALL.len(),
    )
}

fn response_schema() -> serde_json::Value {
    let titles: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.title()).collect();
    serde_json::json!({
        "type": "object",
        "required": ["overallAnalysis", "overallColorCode", "strategies"],
        "properties": {
            "overallAnalysis": {"type": "string"},
            "overallColorCode": {"type": "string"},
            "strategies": {
                "type": "array",
                "minItems": StrategyKind::ALL.len(),
                "maxItems": StrategyKind::ALL.len(),
                "items": {
                    "type": "object",
                    "required": ["title", "content", "colorCode"],
                    "properties": {
                        "title": {"type": "string", "enum": titles},
                        "content": {"type": "string"},
                        "colorCode": {"type": "string"}
                    }
                }
            }
        }
    })
}

pub async fn analyze(
    caller: &dyn ModelCaller,
    req: &StockAnalysisRequest,
) -> Result<StockAnalysis, ModelCallError> {
    let value = caller
        .generate_json(PromptSpec {
            name: FLOW_NAME,
            prompt: prompt(req),
            response_schema: response_schema(),
        })
        .await?;

    let raw = value.to_string();
    let output = serde_json::from_value::<StockAnalysisOutput>(value).map_err(|e| {
        ModelCallError::schema_mismatch(FLOW_NAME, format!("unexpected output shape: {e}"), Some(raw.clone()))
    })?;

    output
        .validate_and_into_analysis(req.ticker())
        .map_err(|e| ModelCallError::schema_mismatch(FLOW_NAME, format!("{e:#}"), Some(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Signal;
    use crate::llm::ModelCallErrorKind;
    use serde_json::json;

    fn valid_output_json() -> serde_json::Value {
        let strategies: Vec<_> = StrategyKind::ALL
            .iter()
            .map(|kind| {
                json!({
                    "title": kind.title(),
                    "content": format!("{kind} outlook"),
                    "colorCode": "green",
                })
            })
            .collect();

        json!({
            "overallAnalysis": "Strong quarter with healthy margins.",
            "overallColorCode": "green",
            "strategies": strategies,
        })
    }

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
    async fn accepts_full_six_section_analysis() {
        let caller = FixedCaller(valid_output_json());
        let req = StockAnalysisRequest::try_new("AAPL").unwrap();
        let analysis = analyze(&caller, &req).await.unwrap();
        assert_eq!(analysis.ticker, "AAPL");
        assert_eq!(analysis.strategies.len(), 6);
        assert_eq!(Signal::from_color_code(&analysis.overall_color_code), Signal::Buy);
    }

    #[tokio::test]
    async fn normalizes_section_order() {
        let mut value = valid_output_json();
        value["strategies"]
            .as_array_mut()
            .unwrap()
            .reverse();
        let caller = FixedCaller(value);
        let req = StockAnalysisRequest::try_new("AAPL").unwrap();
        let analysis = analyze(&caller, &req).await.unwrap();
        let kinds: Vec<_> = analysis.strategies.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, StrategyKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn rejects_missing_section() {
        let mut value = valid_output_json();
        value["strategies"].as_array_mut().unwrap().pop();
        let caller = FixedCaller(value);
        let req = StockAnalysisRequest::try_new("AAPL").unwrap();
        let err = analyze(&caller, &req).await.unwrap_err();
        assert_eq!(err.kind, ModelCallErrorKind::SchemaMismatch);
    }

    #[tokio::test]
    async fn rejects_duplicate_section() {
        let mut value = valid_output_json();
        let arr = value["strategies"].as_array_mut().unwrap();
        arr[1] = arr[0].clone();
        let caller = FixedCaller(value);
        let req = StockAnalysisRequest::try_new("AAPL").unwrap();
        assert!(analyze(&caller, &req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_unknown_section_title() {
        let mut value = valid_output_json();
        value["strategies"][0]["title"] = json!("Momentum");
        let caller = FixedCaller(value);
        let req = StockAnalysisRequest::try_new("AAPL").unwrap();
        assert!(analyze(&caller, &req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_empty_color_code() {
        let mut value = valid_output_json();
        value["strategies"][2]["colorCode"] = json!("  ");
        let caller = FixedCaller(value);
        let req = StockAnalysisRequest::try_new("AAPL").unwrap();
        assert!(analyze(&caller, &req).await.is_err());
    }

    #[test]
    fn rejects_empty_ticker() {
        assert!(StockAnalysisRequest::try_new(" \t").is_err());
    }
}
