//! Pipeline jobs driven through the scheduler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harvest_core::{KeywordCategorizer, Platform};
use integration_tests::fixtures::{self, strings};
use integration_tests::mocks::{ConnectorFailure, MemoryStore, MockConnector};
use source_connectors::SourceQuery;
use tokio::sync::Notify;
use worker::jobs::{ENRICH_PENDING, INGEST_REDDIT};
use worker::{
    EnrichJob, EnrichmentWorker, IngestJob, IngestionWorker, Job, JobOutcome, Scheduler,
    TriggerResult,
};

const HOUR: Duration = Duration::from_secs(3600);

// Paused clock: lets every runnable task reach its next await point
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn enrich_job(store: &Arc<MemoryStore>) -> EnrichJob {
    EnrichJob::new(EnrichmentWorker::new(
        store.clone(),
        Arc::new(fixtures::provider(0.9)),
        strings(&["bug_report", "praise"]),
        0.7,
        5,
    ))
}

fn ingest_job(store: &Arc<MemoryStore>, connector: &Arc<MockConnector>) -> IngestJob {
    IngestJob::new(
        INGEST_REDDIT,
        IngestionWorker::new(
            connector.clone(),
            store.clone(),
            Arc::new(KeywordCategorizer::default()),
            vec![SourceQuery::topic("vscode")],
            25,
        ),
    )
}

/// Blocks until released.
struct GatedJob {
    gate: Arc<Notify>,
}

#[async_trait]
impl Job for GatedJob {
    fn name(&self) -> &str {
        "gated"
    }

    async fn run(&self) -> anyhow::Result<String> {
        self.gate.notified().await;
        Ok("released".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_manual_trigger_runs_enrichment() {
    let store = MemoryStore::shared();
    store
        .insert(harvest_core::Post::from_new(fixtures::new_post(
            fixtures::reddit_candidate("m1", "cursor keeps crashing"),
        )));

    let handle = Scheduler::new()
        .register(enrich_job(&store), HOUR)
        .unwrap()
        .start();

    assert_eq!(handle.trigger(ENRICH_PENDING).unwrap(), TriggerResult::Accepted);
    settle().await;

    let status = handle.status(ENRICH_PENDING).unwrap();
    assert_eq!(status.runs, 1);
    assert_eq!(status.failures, 0);
    match status.last_outcome {
        Some(JobOutcome::Succeeded { summary }) => {
            assert!(summary.starts_with("selected 1, enriched 1"), "{}", summary)
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(store.all()[0].is_enriched());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_interval_runs_ingestion() {
    let store = MemoryStore::shared();
    let connector = Arc::new(MockConnector::new(Platform::Reddit));
    connector.respond(
        &SourceQuery::topic("vscode"),
        vec![fixtures::reddit_candidate("i1", "copilot or cursor?")],
    );

    let handle = Scheduler::new()
        .register(ingest_job(&store, &connector), Duration::from_secs(60))
        .unwrap()
        .start();

    // Nothing runs at startup
    settle().await;
    assert!(connector.calls().is_empty());

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    assert_eq!(connector.calls().len(), 1);
    assert_eq!(
        store.by_key(Platform::Reddit, "i1").unwrap().categories,
        fixtures::labels(&["cursor", "general"])
    );
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_trigger_is_skipped() {
    let gate = Arc::new(Notify::new());
    let handle = Scheduler::new()
        .register(GatedJob { gate: gate.clone() }, HOUR)
        .unwrap()
        .start();

    assert_eq!(handle.trigger("gated").unwrap(), TriggerResult::Accepted);
    settle().await;
    assert!(handle.status("gated").unwrap().running);
    assert_eq!(
        handle.trigger("gated").unwrap(),
        TriggerResult::AlreadyRunning
    );

    gate.notify_one();
    settle().await;

    let status = handle.status("gated").unwrap();
    assert_eq!(status.runs, 1);
    assert_eq!(status.skipped_overlaps, 1);
    assert!(!status.running);
    assert_eq!(handle.trigger("gated").unwrap(), TriggerResult::Accepted);

    settle().await;
    gate.notify_one();
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_job_does_not_affect_others() {
    let store = MemoryStore::shared();
    store.insert(harvest_core::Post::from_new(fixtures::new_post(
        fixtures::reddit_candidate("f1", "windsurf is slow"),
    )));
    let connector = Arc::new(MockConnector::new(Platform::Reddit));
    connector.fail(&SourceQuery::topic("vscode"), ConnectorFailure::Transport);

    let handle = Scheduler::new()
        .register(ingest_job(&store, &connector), HOUR)
        .unwrap()
        .register(enrich_job(&store), HOUR)
        .unwrap()
        .start();

    handle.trigger(INGEST_REDDIT).unwrap();
    handle.trigger(ENRICH_PENDING).unwrap();
    settle().await;

    let ingest = handle.status(INGEST_REDDIT).unwrap();
    assert_eq!(ingest.failures, 1);
    assert!(matches!(
        ingest.last_outcome,
        Some(JobOutcome::Failed { ref error }) if error.contains("every topic failed")
    ));

    let enrich = handle.status(ENRICH_PENDING).unwrap();
    assert_eq!(enrich.failures, 0);
    assert!(matches!(enrich.last_outcome, Some(JobOutcome::Succeeded { .. })));

    // The failed job runs again once its source recovers
    connector.clear_failures();
    assert_eq!(handle.trigger(INGEST_REDDIT).unwrap(), TriggerResult::Accepted);
    settle().await;
    let ingest = handle.status(INGEST_REDDIT).unwrap();
    assert_eq!(ingest.runs, 2);
    assert!(matches!(ingest.last_outcome, Some(JobOutcome::Succeeded { .. })));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_statuses_are_sorted_by_name() {
    let store = MemoryStore::shared();
    let connector = Arc::new(MockConnector::new(Platform::Reddit));
    let handle = Scheduler::new()
        .register(ingest_job(&store, &connector), HOUR)
        .unwrap()
        .register(enrich_job(&store), HOUR)
        .unwrap()
        .start();

    let names: Vec<String> = handle.statuses().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec![ENRICH_PENDING.to_string(), INGEST_REDDIT.to_string()]);

    handle.shutdown().await;
}
