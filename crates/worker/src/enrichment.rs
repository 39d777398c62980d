//! Three-stage analysis of pending posts.
//!
//! For each post: product extraction, then sentiment with the product names
//! (confidence-gated), then categorization against the feedback vocabulary.
//! The three results are written back in one store call; if any stage
//! fails nothing is written and the post stays pending for the next run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use analysis_client::AnalysisProvider;
use harvest_core::{CorpusStore, Enrichment, ErrorCategory, Post};
use serde::Serialize;
use telemetry::{health, metrics};
use tracing::{debug, info, warn};

/// What happened to one post.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    Enriched { confidence: f64, suppressed: bool },
    SkippedEmpty,
    Failed {
        category: ErrorCategory,
        message: String,
    },
}

/// Totals for one enrichment batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentReport {
    pub selected: usize,
    pub processed: usize,
    pub suppressed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub errors_by_category: BTreeMap<ErrorCategory, usize>,
    pub error_messages: Vec<String>,
}

impl EnrichmentReport {
    fn record(&mut self, post: &Post, outcome: &PostOutcome) {
        match outcome {
            PostOutcome::Enriched { suppressed, .. } => {
                self.processed += 1;
                if *suppressed {
                    self.suppressed += 1;
                }
            }
            PostOutcome::SkippedEmpty => self.skipped += 1,
            PostOutcome::Failed { category, message } => {
                self.errors += 1;
                *self.errors_by_category.entry(*category).or_default() += 1;
                self.error_messages
                    .push(format!("post {}: [{}] {}", post.id, category, message));
            }
        }
    }
}

impl fmt::Display for EnrichmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "selected {}, enriched {} ({} suppressed), skipped {}, errors {}",
            self.selected, self.processed, self.suppressed, self.skipped, self.errors
        )?;
        for (category, count) in &self.errors_by_category {
            write!(f, ", {} {}", category, count)?;
        }
        Ok(())
    }
}

pub struct EnrichmentWorker {
    store: Arc<dyn CorpusStore>,
    provider: Arc<dyn AnalysisProvider>,
    feedback_categories: Vec<String>,
    min_confidence: f64,
    batch_size: usize,
}

impl EnrichmentWorker {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        provider: Arc<dyn AnalysisProvider>,
        feedback_categories: Vec<String>,
        min_confidence: f64,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            provider,
            feedback_categories,
            min_confidence,
            batch_size,
        }
    }

    /// Enriches up to `batch_size` pending posts, one after another.
    ///
    /// Only failing to select the batch is an error; per-post failures are
    /// counted in the report.
    pub async fn run_batch(&self) -> harvest_core::Result<EnrichmentReport> {
        let pending = self.store.pending_enrichment(self.batch_size).await?;
        metrics().pending_enrichment.set(pending.len() as u64);

        let mut report = EnrichmentReport {
            selected: pending.len(),
            ..Default::default()
        };

        for post in &pending {
            let outcome = self.enrich_post(post).await;
            self.observe(post, &outcome);
            report.record(post, &outcome);
        }

        info!(%report, "Enrichment batch complete");
        Ok(report)
    }

    /// Runs the three stages for one post and writes the result.
    pub async fn enrich_post(&self, post: &Post) -> PostOutcome {
        if !post.has_content() {
            return PostOutcome::SkippedEmpty;
        }
        let text = post.content_text.as_str();

        let products = match self.provider.extract_products(text).await {
            Ok(products) => products,
            Err(e) => return failed(e.category(), e),
        };
        let names = products.product_names();

        let mut sentiment = match self.provider.analyze_sentiment(text, &names).await {
            Ok(sentiment) => sentiment,
            Err(e) => return failed(e.category(), e),
        };
        let suppressed = sentiment.gate(self.min_confidence);
        if suppressed {
            debug!(post_id = %post.id, confidence = sentiment.confidence, "Sentiment below threshold, reported as neutral");
        }

        let categories = match self
            .provider
            .categorize(text, &self.feedback_categories, &names)
            .await
        {
            Ok(categories) => categories,
            Err(e) => return failed(e.category(), e),
        };

        let enrichment = Enrichment::combine(products, sentiment, categories);
        let confidence = enrichment.confidence;

        match self.store.apply_enrichment(post.id, enrichment).await {
            Ok(true) => PostOutcome::Enriched {
                confidence,
                suppressed,
            },
            Ok(false) => failed(
                ErrorCategory::Storage,
                "post was deleted or enriched concurrently",
            ),
            Err(e) => failed(ErrorCategory::Storage, e),
        }
    }

    fn observe(&self, post: &Post, outcome: &PostOutcome) {
        let m = metrics();
        match outcome {
            PostOutcome::Enriched {
                confidence,
                suppressed,
            } => {
                m.posts_enriched.inc();
                if *suppressed {
                    m.sentiment_suppressed.inc();
                }
                health().analysis.set_healthy();
                debug!(post_id = %post.id, confidence, suppressed, "Post enriched");
            }
            PostOutcome::SkippedEmpty => {
                m.posts_skipped.inc();
                debug!(post_id = %post.id, "Post has no text, skipped");
            }
            PostOutcome::Failed { category, message } => {
                m.enrichment_errors.record(category.as_str());
                if *category != ErrorCategory::Storage {
                    health().analysis.set_unhealthy(message.clone());
                }
                warn!(post_id = %post.id, %category, error = %message, "Enrichment failed, post stays pending");
            }
        }
    }
}

fn failed(category: ErrorCategory, err: impl fmt::Display) -> PostOutcome {
    PostOutcome::Failed {
        category,
        message: err.to_string(),
    }
}
