//! OpenAI chat-completions provider (JSON mode).

use async_trait::async_trait;
use harvest_core::{
    decode_categorization, decode_products, decode_sentiment, ContentCategorization,
    ProductExtraction, SentimentAnalysis,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::error::{AnalysisError, Result};
use crate::prompts;
use crate::AnalysisProvider;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Single-attempt provider; wrap in [`crate::RetryingProvider`] for retries.
pub struct OpenAiProvider {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(AnalysisError::service("openai api key not set"));
        }
        // Backstop only; the retry layer enforces the per-call deadline
        let http = reqwest::Client::builder()
            .timeout(config.call_timeout() * 2)
            .build()?;
        Ok(Self { http, config })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| AnalysisError::service(format!("invalid api key header: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Sends one chat request and returns the raw message content.
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.config.model, "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            return Err(AnalysisError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Service {
                status: Some(status.as_u16()),
                message: error_text,
            });
        }

        let body = response.text().await?;
        extract_content(&body)
    }
}

/// Pulls the first choice's content out of a chat-completions body.
fn extract_content(body: &str) -> Result<String> {
    let chat: ChatResponse =
        serde_json::from_str(body).map_err(|e| AnalysisError::Malformed(e.to_string()))?;
    chat.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AnalysisError::Malformed("no content in response".to_string()))
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    async fn extract_products(&self, text: &str) -> Result<ProductExtraction> {
        let prompt = prompts::products_prompt(text, &self.config.supported_products);
        let raw = self.complete(prompts::PRODUCTS_SYSTEM, &prompt).await?;
        Ok(decode_products(&raw)?)
    }

    async fn analyze_sentiment(&self, text: &str, products: &[String]) -> Result<SentimentAnalysis> {
        let prompt = prompts::sentiment_prompt(text, products);
        let raw = self.complete(prompts::SENTIMENT_SYSTEM, &prompt).await?;
        Ok(decode_sentiment(&raw)?)
    }

    async fn categorize(
        &self,
        text: &str,
        categories: &[String],
        products: &[String],
    ) -> Result<ContentCategorization> {
        let prompt = prompts::categorize_prompt(text, categories, products);
        let raw = self.complete(prompts::CATEGORIZE_SYSTEM, &prompt).await?;
        Ok(decode_categorization(&raw)?)
    }
}
