//! OpenAI-compatible vision extractor
//!
//! Sends every page of the bill as a `data:` URL image part to any server
//! implementing `/v1/chat/completions` with vision support (OpenAI, vLLM,
//! LocalAI, llama-server with a multimodal model).
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::AnalysisResult;
use crate::error::{Error, Result};

use super::parsing::parse_analysis_response;
use super::{BillExtractor, BillImage};

const DEFAULT_MODEL: &str = "gpt-4o";
const MAX_TOKENS: u32 = 2048;

const AUDITOR_PROMPT: &str = r#"You are an energy auditor reading electricity bill images. Return ONLY a JSON object, no markdown.

Use only what is visible on the bill. Do not invent rates that are not printed. Every ai_analysis and action_plan item must cite concrete figures from the bill (dollar amounts, kWh, percentages).

Fields:
- total_amount: number, total amount due
- usage_kwh: number, usage this period in kWh
- previous_usage_kwh: number or null
- billing_date: "YYYY-MM-DD" or null
- breakdown_json: object of charge category -> amount, e.g. {"Delivery": 50, "Generation": 100}
- tips_json: 3 to 5 short saving tips (strings)
- next_month_forecast: number, estimated next bill from the usage trend
- monthly_usage: exactly 12 objects Jan..Dec, each {"month": "Jan", "usage": kWh, "temp": average °C (estimate if unknown)}
- ai_analysis: 4 objects {"icon": "zap"|"clock"|"dollar"|"thermometer", "title", "description"} naming the top cost drivers and usage trends
- action_plan: 3 objects {"id": "action-1", "icon": "car"|"thermometer"|"shirt"|"zap"|"clock", "title", "description", "savings": "$XX.XX"}; estimate savings from printed rates, or as a percentage of the relevant charge when no rate is printed"#;

/// OpenAI-compatible extraction backend
#[derive(Clone)]
pub struct OpenAICompatibleExtractor {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleExtractor {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Create from environment variables
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    /// Optional: `OPENAI_COMPATIBLE_MODEL` (default: gpt-4o), `OPENAI_COMPATIBLE_API_KEY`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model =
            std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut extractor = Self::new(&host, &model);
        extractor.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        Some(extractor)
    }

    fn build_request(&self, images: &[BillImage]) -> ChatCompletionRequest {
        let mut parts = vec![ContentPart::Text {
            text: AUDITOR_PROMPT.to_string(),
        }];
        parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.data_url(),
            },
        }));

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: parts,
            }],
            temperature: Some(0.1),
            max_tokens: MAX_TOKENS,
            stream: false,
        }
    }

    async fn vision_completion(&self, images: &[BillImage]) -> Result<String> {
        let request = self.build_request(images);

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!(
                "Vision API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Extraction("No response from vision API".into()))
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

/// Content part for multimodal messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl BillExtractor for OpenAICompatibleExtractor {
    async fn analyze_bill(&self, images: &[BillImage]) -> Result<AnalysisResult> {
        if images.is_empty() {
            return Err(Error::InvalidData("No bill images provided".into()));
        }

        info!(pages = images.len(), model = %self.model, "Analyzing bill");
        let response = self.vision_completion(images).await?;
        debug!("Vision response: {}", response);

        parse_analysis_response(&response)
    }

    async fn health_check(&self) -> bool {
        // /v1/models is standard; /health and / cover servers that don't list models
        let candidates = [
            format!("{}/v1/models", self.base_url),
            format!("{}/health", self.base_url),
            self.base_url.clone(),
        ];

        for url in candidates {
            if let Ok(resp) = self.http_client.get(&url).send().await {
                if resp.status().is_success() {
                    return true;
                }
            }
        }

        false
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let extractor = OpenAICompatibleExtractor::new("http://localhost:8000/", "gpt-4o");
        assert_eq!(extractor.host(), "http://localhost:8000");

        let pages = vec![
            BillImage::new(b"%PDF-1.4".to_vec(), None, Some("p1.pdf")).unwrap(),
            BillImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0], None, Some("p2.jpg")).unwrap(),
        ];
        let body = serde_json::to_value(extractor.build_request(&pages)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2048);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:application/pdf;base64,"));
        assert!(content[2]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_analyze_requires_images() {
        let extractor = OpenAICompatibleExtractor::new("http://localhost:1", "gpt-4o");
        let err = extractor.analyze_bill(&[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unhealthy() {
        let extractor = OpenAICompatibleExtractor::new("http://127.0.0.1:1", "gpt-4o");
        assert!(!extractor.health_check().await);
    }
}
