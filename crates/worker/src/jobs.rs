//! Scheduler jobs for the harvest pipeline.

use async_trait::async_trait;
use clickhouse_store::{insert_metrics, ClickHouseClient};

use crate::enrichment::EnrichmentWorker;
use crate::ingestion::IngestionWorker;
use crate::scheduler::Job;

pub const INGEST_REDDIT: &str = "ingest-reddit";
pub const INGEST_TWITTER: &str = "ingest-twitter";
pub const ENRICH_PENDING: &str = "enrich-pending";
pub const FLUSH_METRICS: &str = "flush-metrics";

/// Runs one ingestion pass over a connector's topics.
pub struct IngestJob {
    name: &'static str,
    worker: IngestionWorker,
}

impl IngestJob {
    pub fn new(name: &'static str, worker: IngestionWorker) -> Self {
        Self { name, worker }
    }
}

#[async_trait]
impl Job for IngestJob {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self) -> anyhow::Result<String> {
        let report = self.worker.run().await;
        if report.all_topics_failed() {
            anyhow::bail!("every topic failed: {}", report);
        }
        Ok(report.to_string())
    }
}

/// Enriches one batch of pending posts.
pub struct EnrichJob {
    worker: EnrichmentWorker,
}

impl EnrichJob {
    pub fn new(worker: EnrichmentWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl Job for EnrichJob {
    fn name(&self) -> &str {
        ENRICH_PENDING
    }

    async fn run(&self) -> anyhow::Result<String> {
        let report = self.worker.run_batch().await?;
        Ok(report.to_string())
    }
}

/// Persists a snapshot of the in-process metrics.
pub struct MetricsFlushJob {
    client: ClickHouseClient,
}

impl MetricsFlushJob {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Job for MetricsFlushJob {
    fn name(&self) -> &str {
        FLUSH_METRICS
    }

    async fn run(&self) -> anyhow::Result<String> {
        let snapshot = telemetry::metrics().snapshot();
        let summary = format!(
            "fetched {}, created {}, enriched {}, enrichment errors {}",
            snapshot.posts_fetched,
            snapshot.posts_created,
            snapshot.posts_enriched,
            snapshot.enrichment_errors
        );
        insert_metrics(&self.client, snapshot).await?;
        Ok(summary)
    }
}
