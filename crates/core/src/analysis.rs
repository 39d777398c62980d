//! Structured analysis results and their validating decoders.
//!
//! Provider payloads are parsed into these types before anything is
//! written. A payload that fails to parse, misses a required field, or
//! carries a confidence outside `[0, 1]` is a [`DecodeError`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::post::Sentiment;

/// Provider payload did not match the expected shape.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("malformed {stage} payload: {message}")]
pub struct DecodeError {
    pub stage: &'static str,
    pub message: String,
}

impl DecodeError {
    fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// One product mentioned in a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProductMention {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub is_primary_mention: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub comparisons: Vec<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

/// Stage 1 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProductExtraction {
    #[serde(default)]
    pub products: Vec<ProductMention>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl ProductExtraction {
    /// Product names, in the order the provider listed them.
    pub fn product_names(&self) -> Vec<String> {
        self.products.iter().map(|p| p.name.clone()).collect()
    }
}

/// Sentiment towards one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProductSentiment {
    pub sentiment: Sentiment,
    #[serde(default)]
    pub aspects: BTreeMap<String, String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub intensity: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Stage 2 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SentimentAnalysis {
    pub sentiment: Sentiment,
    #[serde(default)]
    pub product_sentiments: BTreeMap<String, ProductSentiment>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub intensity: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: Option<String>,
    /// Set when the confidence gate forced the labels to neutral
    #[serde(default)]
    pub suppressed: bool,
}

impl SentimentAnalysis {
    /// Applies the confidence gate.
    ///
    /// Below `min_confidence` the overall and every per-product label become
    /// neutral. The raw confidence and explanation are kept. Returns whether
    /// the gate fired.
    pub fn gate(&mut self, min_confidence: f64) -> bool {
        if self.confidence >= min_confidence {
            return false;
        }
        self.sentiment = Sentiment::Neutral;
        for product in self.product_sentiments.values_mut() {
            product.sentiment = Sentiment::Neutral;
        }
        self.suppressed = true;
        true
    }
}

/// Stage 3 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ContentCategorization {
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub secondary_categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub product_context: BTreeMap<String, String>,
}

/// All three analysis results for one post, written as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub products: ProductExtraction,
    pub sentiment: SentimentAnalysis,
    pub categories: ContentCategorization,
    /// Minimum of the three stage confidences (raw sentiment confidence)
    pub confidence: f64,
    pub analyzed_at: DateTime<Utc>,
}

impl Enrichment {
    /// Combines the stage results. The timestamp is taken here, once.
    pub fn combine(
        products: ProductExtraction,
        sentiment: SentimentAnalysis,
        categories: ContentCategorization,
    ) -> Self {
        let confidence = products
            .confidence
            .min(sentiment.confidence)
            .min(categories.confidence);
        Self {
            products,
            sentiment,
            categories,
            confidence,
            analyzed_at: Utc::now(),
        }
    }
}

/// Strips a surrounding markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn parse<T: DeserializeOwned>(stage: &'static str, raw: &str) -> Result<T, DecodeError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(DecodeError::new(stage, "empty response"));
    }
    serde_json::from_str(body).map_err(|e| DecodeError::new(stage, e.to_string()))
}

/// Decodes and validates a product extraction payload.
pub fn decode_products(raw: &str) -> Result<ProductExtraction, DecodeError> {
    let result: ProductExtraction = parse("products", raw)?;
    result
        .validate()
        .map_err(|e| DecodeError::new("products", e.to_string()))?;
    for product in &result.products {
        product
            .validate()
            .map_err(|e| DecodeError::new("products", format!("{}: {}", product.name, e)))?;
    }
    Ok(result)
}

/// Decodes and validates a sentiment payload.
pub fn decode_sentiment(raw: &str) -> Result<SentimentAnalysis, DecodeError> {
    let mut result: SentimentAnalysis = parse("sentiment", raw)?;
    result
        .validate()
        .map_err(|e| DecodeError::new("sentiment", e.to_string()))?;
    for (name, product) in &result.product_sentiments {
        product
            .validate()
            .map_err(|e| DecodeError::new("sentiment", format!("{}: {}", name, e)))?;
    }
    // Only the gate may set this
    result.suppressed = false;
    Ok(result)
}

/// Decodes and validates a categorization payload.
pub fn decode_categorization(raw: &str) -> Result<ContentCategorization, DecodeError> {
    let result: ContentCategorization = parse("categorization", raw)?;
    result
        .validate()
        .map_err(|e| DecodeError::new("categorization", e.to_string()))?;
    Ok(result)
}
