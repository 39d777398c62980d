//! Analysis provider for post enrichment.
//!
//! Three structured calls per post: product extraction, sentiment, and
//! categorization. [`OpenAiProvider`] makes single attempts;
//! [`RetryingProvider`] adds the per-call timeout and bounded retry.

pub mod config;
pub mod error;
pub mod openai;
pub mod prompts;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use harvest_core::{ContentCategorization, ProductExtraction, SentimentAnalysis};

pub use config::OpenAiConfig;
pub use error::{AnalysisError, Result};
pub use openai::OpenAiProvider;
pub use retry::{with_retry, RetryPolicy, RetryingProvider};

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn extract_products(&self, text: &str) -> Result<ProductExtraction>;

    async fn analyze_sentiment(&self, text: &str, products: &[String]) -> Result<SentimentAnalysis>;

    async fn categorize(
        &self,
        text: &str,
        categories: &[String],
        products: &[String],
    ) -> Result<ContentCategorization>;
}

#[async_trait]
impl<P: AnalysisProvider + ?Sized> AnalysisProvider for Arc<P> {
    async fn extract_products(&self, text: &str) -> Result<ProductExtraction> {
        (**self).extract_products(text).await
    }

    async fn analyze_sentiment(&self, text: &str, products: &[String]) -> Result<SentimentAnalysis> {
        (**self).analyze_sentiment(text, products).await
    }

    async fn categorize(
        &self,
        text: &str,
        categories: &[String],
        products: &[String],
    ) -> Result<ContentCategorization> {
        (**self).categorize(text, categories, products).await
    }
}

/// Builds the production provider: OpenAI wrapped in the retry layer.
pub fn openai_provider(config: OpenAiConfig) -> Result<RetryingProvider<OpenAiProvider>> {
    let policy = config.retry_policy();
    let timeout = config.call_timeout();
    Ok(RetryingProvider::new(
        OpenAiProvider::new(config)?,
        policy,
        timeout,
    ))
}
