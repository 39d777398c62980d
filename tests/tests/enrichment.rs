//! Enrichment worker against the in-memory store and a canned provider.

use std::sync::Arc;
use std::time::Duration;

use analysis_client::{AnalysisError, AnalysisProvider, RetryPolicy, RetryingProvider};
use harvest_core::{CorpusStore, ErrorCategory, Post, Sentiment};
use integration_tests::fixtures::{self, strings};
use integration_tests::mocks::{MemoryStore, MockAnalysisProvider, Stage};
use worker::{EnrichmentWorker, PostOutcome};

const MIN_CONFIDENCE: f64 = 0.7;

fn feedback() -> Vec<String> {
    strings(&["bug_report", "feature_request", "praise", "complaint"])
}

fn enrichment_worker(
    store: &Arc<MemoryStore>,
    provider: Arc<dyn AnalysisProvider>,
    batch_size: usize,
) -> EnrichmentWorker {
    EnrichmentWorker::new(store.clone(), provider, feedback(), MIN_CONFIDENCE, batch_size)
}

async fn seed(store: &MemoryStore, id: &str, text: &str) -> Post {
    store
        .create(fixtures::new_post(fixtures::reddit_candidate(id, text)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_low_confidence_sentiment_is_reported_neutral() {
    let store = MemoryStore::shared();
    let post = seed(&store, "p1", "Cursor is fine I guess").await;

    let provider = Arc::new(MockAnalysisProvider::new(
        fixtures::products(&["Cursor"], 0.9),
        fixtures::sentiment(Sentiment::Positive, 0.4, &["Cursor"]),
        fixtures::categorization("praise", 0.8),
    ));
    let worker = enrichment_worker(&store, provider, 5);

    let outcome = worker.enrich_post(&post).await;
    assert_eq!(
        outcome,
        PostOutcome::Enriched {
            confidence: 0.4,
            suppressed: true
        }
    );

    let stored = store.get(post.id).await.unwrap().unwrap();
    assert_eq!(stored.sentiment, Some(Sentiment::Neutral));
    assert_eq!(stored.category.as_deref(), Some("praise"));

    let enrichment = stored.enrichment.unwrap();
    assert_eq!(enrichment.confidence, 0.4);
    assert!(enrichment.sentiment.suppressed);
    assert_eq!(enrichment.sentiment.confidence, 0.4);
    assert_eq!(
        enrichment.sentiment.product_sentiments["Cursor"].sentiment,
        Sentiment::Neutral
    );
}

#[tokio::test]
async fn test_confident_sentiment_is_kept() {
    let store = MemoryStore::shared();
    let post = seed(&store, "p2", "Cursor crashed and lost my work").await;

    let worker = enrichment_worker(&store, Arc::new(fixtures::provider(0.95)), 5);
    let outcome = worker.enrich_post(&post).await;
    assert_eq!(
        outcome,
        PostOutcome::Enriched {
            confidence: 0.9,
            suppressed: false
        }
    );

    let stored = store.get(post.id).await.unwrap().unwrap();
    assert_eq!(stored.sentiment, Some(Sentiment::Negative));
    assert_eq!(stored.enrichment.unwrap().confidence, 0.9);
}

#[tokio::test]
async fn test_stage_failure_writes_nothing() {
    let store = MemoryStore::shared();
    let post = seed(&store, "p3", "Windsurf feature idea").await;
    let writes = store.write_count();

    let provider = Arc::new(fixtures::provider(0.9));
    provider.fail_always(Stage::Categorize, AnalysisError::Malformed("not json".into()));
    let worker = enrichment_worker(&store, provider.clone(), 5);

    let outcome = worker.enrich_post(&post).await;
    assert!(matches!(
        outcome,
        PostOutcome::Failed {
            category: ErrorCategory::MalformedResponse,
            ..
        }
    ));
    assert_eq!(store.write_count(), writes);

    let stored = store.get(post.id).await.unwrap().unwrap();
    assert!(!stored.is_enriched());
    assert!(stored.sentiment.is_none());
    assert_eq!(store.pending_enrichment(10).await.unwrap().len(), 1);

    // The earlier stages did run
    assert_eq!(provider.calls_for(Stage::Products).len(), 1);
    assert_eq!(provider.calls_for(Stage::Sentiment).len(), 1);
}

#[tokio::test]
async fn test_empty_post_is_skipped_without_provider_calls() {
    let store = MemoryStore::shared();
    let post = seed(&store, "p4", "   ").await;

    let provider = Arc::new(fixtures::provider(0.9));
    let worker = enrichment_worker(&store, provider.clone(), 5);

    assert_eq!(worker.enrich_post(&post).await, PostOutcome::SkippedEmpty);
    assert!(provider.calls().is_empty());
    assert!(!store.get(post.id).await.unwrap().unwrap().is_enriched());
}

#[tokio::test]
async fn test_stage_inputs_are_chained() {
    let store = MemoryStore::shared();
    let post = seed(&store, "p5", "Cursor vs Windsurf for monorepos").await;

    let provider = Arc::new(MockAnalysisProvider::new(
        fixtures::products(&["Cursor", "Windsurf"], 0.85),
        fixtures::sentiment(Sentiment::Mixed, 0.8, &["Cursor", "Windsurf"]),
        fixtures::categorization("comparison", 0.75),
    ));
    let worker = enrichment_worker(&store, provider.clone(), 5);
    worker.enrich_post(&post).await;

    let products = provider.calls_for(Stage::Products);
    assert_eq!(products[0].text, "Cursor vs Windsurf for monorepos");

    let sentiment = provider.calls_for(Stage::Sentiment);
    assert_eq!(sentiment[0].products, strings(&["Cursor", "Windsurf"]));

    let categorize = provider.calls_for(Stage::Categorize);
    assert_eq!(categorize[0].products, strings(&["Cursor", "Windsurf"]));
    assert_eq!(categorize[0].categories, feedback());

    let stored = store.get(post.id).await.unwrap().unwrap();
    assert_eq!(stored.enrichment.unwrap().confidence, 0.75);
}

#[tokio::test]
async fn test_batch_continues_after_errors() {
    let store = MemoryStore::shared();
    seed(&store, "b1", "cursor one").await;
    seed(&store, "b2", "cursor two").await;
    seed(&store, "b3", "").await;

    // First products call times out, the rest succeed
    let provider = Arc::new(fixtures::provider(0.9));
    provider.fail_times(
        Stage::Products,
        1,
        AnalysisError::Timeout(Duration::from_secs(30)),
    );
    let worker = enrichment_worker(&store, provider, 5);

    let report = worker.run_batch().await.unwrap();
    assert_eq!(report.selected, 3);
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.errors_by_category[&ErrorCategory::Timeout], 1);
    assert_eq!(report.error_messages.len(), 1);

    // The failed post is picked up by the next batch
    let report = worker.run_batch().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.errors, 0);

    let enriched = store.all().iter().filter(|p| p.is_enriched()).count();
    assert_eq!(enriched, 2);
}

#[tokio::test]
async fn test_batch_size_bounds_selection() {
    let store = MemoryStore::shared();
    for i in 0..4 {
        seed(&store, &format!("s{}", i), "copilot alternative").await;
    }

    let worker = enrichment_worker(&store, Arc::new(fixtures::provider(0.9)), 3);
    let report = worker.run_batch().await.unwrap();

    assert_eq!(report.selected, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(store.pending_enrichment(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_enriched_posts_are_not_reanalysed() {
    let store = MemoryStore::shared();
    seed(&store, "once", "cursor once").await;

    let provider = Arc::new(fixtures::provider(0.9));
    let worker = enrichment_worker(&store, provider.clone(), 5);

    worker.run_batch().await.unwrap();
    let report = worker.run_batch().await.unwrap();

    assert_eq!(report.selected, 0);
    assert_eq!(provider.calls_for(Stage::Products).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retrying_provider_recovers_from_transient_failures() {
    let store = MemoryStore::shared();
    let post = seed(&store, "r1", "cursor rate limits").await;

    let mock = Arc::new(fixtures::provider(0.9));
    mock.fail_times(
        Stage::Sentiment,
        2,
        AnalysisError::RateLimited { retry_after: None },
    );
    let provider = RetryingProvider::new(
        mock.clone(),
        RetryPolicy::new(3, Duration::from_secs(4), Duration::from_secs(10)),
        Duration::from_secs(30),
    );
    let worker = enrichment_worker(&store, Arc::new(provider), 5);

    let outcome = worker.enrich_post(&post).await;
    assert!(matches!(outcome, PostOutcome::Enriched { .. }));
    assert_eq!(mock.calls_for(Stage::Sentiment).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retrying_provider_gives_up_after_max_attempts() {
    let store = MemoryStore::shared();
    let post = seed(&store, "r2", "cursor is down").await;

    let mock = Arc::new(fixtures::provider(0.9));
    mock.fail_always(Stage::Products, AnalysisError::service("overloaded"));
    let provider = RetryingProvider::new(
        mock.clone(),
        RetryPolicy::new(3, Duration::from_secs(4), Duration::from_secs(10)),
        Duration::from_secs(30),
    );
    let worker = enrichment_worker(&store, Arc::new(provider), 5);

    let outcome = worker.enrich_post(&post).await;
    assert!(matches!(
        outcome,
        PostOutcome::Failed {
            category: ErrorCategory::Service,
            ..
        }
    ));
    assert_eq!(mock.calls_for(Stage::Products).len(), 3);
    assert!(mock.calls_for(Stage::Sentiment).is_empty());
}
