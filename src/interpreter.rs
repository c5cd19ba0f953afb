use crate::config::ExtractionConfig;
use crate::types::{AlertError, CostEstimate, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts cost estimates \
from CBO reports. Return only the numerical cost value in billions of dollars. If \
multiple numbers exist, return the total cost. If no clear cost is found, return 'No \
clear cost estimate found.'";

/// Seam to the natural-language extraction service, so the scheduled
/// pipeline and any on-demand caller share one implementation and tests
/// can substitute their own.
#[async_trait]
pub trait CostModel: Send + Sync {
    /// Reduce a budget-office report to the service's raw answer text.
    async fn extract_cost(&self, report_text: &str) -> Result<String>;
}

/// Chat-completion client against an OpenAI-compatible endpoint, pinned
/// to a deterministic configuration: temperature 0, bounded output.
pub struct OpenAiCostModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiCostModel {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CostModel for OpenAiCostModel {
    async fn extract_cost(&self, report_text: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!(
                        "Extract the total cost estimate in billions of dollars from this CBO report text: {report_text}"
                    ),
                },
            ],
            temperature: 0.0,
            max_tokens: 100,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Extraction(format!(
                "extraction service returned HTTP {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AlertError::Extraction("empty extraction response".to_string()))
    }
}

/// Turns report text into a `CostEstimate` via the extraction service.
pub struct CostInterpreter {
    model: Arc<dyn CostModel>,
}

impl CostInterpreter {
    pub fn new(model: Arc<dyn CostModel>) -> Self {
        Self { model }
    }

    /// Never fails: an unreachable service, the sentinel phrase, and an
    /// unparsable answer all come back as `billions: None`.
    pub async fn interpret(&self, report_text: &str) -> CostEstimate {
        let raw = match self.model.extract_cost(report_text).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("extraction service call failed: {}", e);
                return CostEstimate {
                    raw: String::new(),
                    billions: None,
                };
            }
        };

        let billions = parse_billions(&raw);
        if billions.is_none() {
            info!("no numeric cost in extraction response: {:?}", raw);
        }
        CostEstimate { raw, billions }
    }
}

/// Strip everything but digits, decimal point, and minus sign, then parse.
fn parse_billions(raw: &str) -> Option<f64> {
    let sanitized: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    sanitized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_figure_parses_to_billions() {
        assert_eq!(parse_billions("$12.3 billion"), Some(12.3));
    }

    #[test]
    fn bare_number_parses() {
        assert_eq!(parse_billions("2.5"), Some(2.5));
    }

    #[test]
    fn sentinel_phrase_is_not_a_number() {
        assert_eq!(parse_billions("No clear cost estimate found."), None);
    }

    #[test]
    fn arbitrary_prose_is_not_a_number() {
        assert_eq!(parse_billions("Error processing cost estimate"), None);
        assert_eq!(parse_billions(""), None);
    }

    #[test]
    fn negative_figures_survive() {
        assert_eq!(parse_billions("-0.4 billion (savings)"), Some(-0.4));
    }

    /// Answers with the fixed string, or errors when `None`.
    struct FixedModel(Option<String>);

    #[async_trait]
    impl CostModel for FixedModel {
        async fn extract_cost(&self, _report_text: &str) -> Result<String> {
            self.0
                .clone()
                .ok_or_else(|| AlertError::Extraction("service unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn service_failure_yields_not_a_number() {
        let interpreter = CostInterpreter::new(Arc::new(FixedModel(None)));
        let estimate = interpreter.interpret("whatever").await;
        assert_eq!(estimate.billions, None);
    }

    #[tokio::test]
    async fn numeric_answer_is_kept_with_its_raw_form() {
        let interpreter = CostInterpreter::new(Arc::new(FixedModel(Some("2.5".to_string()))));
        let estimate = interpreter.interpret("report").await;
        assert_eq!(estimate.billions, Some(2.5));
        assert_eq!(estimate.raw, "2.5");
    }
}
