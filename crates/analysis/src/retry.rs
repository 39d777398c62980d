//! Per-call timeout and bounded exponential retry.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use harvest_core::{ContentCategorization, ProductExtraction, SentimentAnalysis};
use tracing::warn;

use crate::error::{AnalysisError, Result};
use crate::AnalysisProvider;

/// Exponential backoff from `backoff_floor`, doubling per attempt, capped at
/// `backoff_ceiling`, for at most `max_attempts` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_floor: Duration, backoff_ceiling: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_floor,
            backoff_ceiling: backoff_ceiling.max(backoff_floor),
        }
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_floor
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.backoff_ceiling)
            .min(self.backoff_ceiling)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(4), Duration::from_secs(10))
    }
}

/// Runs `op` under `timeout`, retrying every failure per `policy`.
///
/// The last error is returned once attempts are exhausted. Every error
/// kind retries the same way.
pub async fn with_retry<T, F, Fut>(
    stage: &'static str,
    policy: RetryPolicy,
    timeout: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout(timeout)),
        };
        telemetry::metrics()
            .analysis_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => return Err(err),
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    stage,
                    attempt,
                    max_attempts = policy.max_attempts,
                    category = %err.category(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Analysis call failed, retrying"
                );
                telemetry::metrics().analysis_retries.inc();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Wraps a provider so every call runs under [`with_retry`].
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<P: AnalysisProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            timeout,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: AnalysisProvider> AnalysisProvider for RetryingProvider<P> {
    async fn extract_products(&self, text: &str) -> Result<ProductExtraction> {
        with_retry("products", self.policy, self.timeout, || {
            self.inner.extract_products(text)
        })
        .await
    }

    async fn analyze_sentiment(&self, text: &str, products: &[String]) -> Result<SentimentAnalysis> {
        with_retry("sentiment", self.policy, self.timeout, || {
            self.inner.analyze_sentiment(text, products)
        })
        .await
    }

    async fn categorize(
        &self,
        text: &str,
        categories: &[String],
        products: &[String],
    ) -> Result<ContentCategorization> {
        with_retry("categorization", self.policy, self.timeout, || {
            self.inner.categorize(text, categories, products)
        })
        .await
    }
}
