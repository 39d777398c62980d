//! Metrics snapshot persistence.

use crate::client::ClickHouseClient;
use clickhouse::Row;
use harvest_core::error::DbErrorCode;
use harvest_core::{Error, Result};
use serde::Serialize;
use telemetry::MetricsSnapshot;

/// Metrics snapshot row for `harvest_metrics`.
#[derive(Debug, Clone, Row, Serialize)]
pub struct MetricsRow {
    pub timestamp: i64,
    pub posts_fetched: u64,
    pub posts_created: u64,
    pub posts_merged: u64,
    pub posts_unchanged: u64,
    pub ingest_failures: u64,
    pub connector_errors: u64,
    pub connector_rate_limits: u64,
    pub posts_enriched: u64,
    pub posts_skipped: u64,
    pub sentiment_suppressed: u64,
    pub analysis_retries: u64,
    pub enrichment_errors: u64,
    pub enrichment_timeouts: u64,
    pub enrichment_malformed: u64,
    pub job_runs: u64,
    pub job_failures: u64,
    pub job_skipped_overlaps: u64,
    pub connector_latency_mean_ms: f64,
    pub analysis_latency_mean_ms: f64,
    pub store_latency_mean_ms: f64,
    pub job_duration_mean_ms: f64,
    pub jobs_running: u64,
    pub pending_enrichment: u64,
}

impl From<MetricsSnapshot> for MetricsRow {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            timestamp: s.timestamp.timestamp_millis(),
            posts_fetched: s.posts_fetched,
            posts_created: s.posts_created,
            posts_merged: s.posts_merged,
            posts_unchanged: s.posts_unchanged,
            ingest_failures: s.ingest_failures,
            connector_errors: s.connector_errors,
            connector_rate_limits: s.connector_rate_limits,
            posts_enriched: s.posts_enriched,
            posts_skipped: s.posts_skipped,
            sentiment_suppressed: s.sentiment_suppressed,
            analysis_retries: s.analysis_retries,
            enrichment_errors: s.enrichment_errors,
            enrichment_timeouts: s.enrichment_timeouts,
            enrichment_malformed: s.enrichment_malformed,
            job_runs: s.job_runs,
            job_failures: s.job_failures,
            job_skipped_overlaps: s.job_skipped_overlaps,
            connector_latency_mean_ms: s.connector_latency_mean_ms,
            analysis_latency_mean_ms: s.analysis_latency_mean_ms,
            store_latency_mean_ms: s.store_latency_mean_ms,
            job_duration_mean_ms: s.job_duration_mean_ms,
            jobs_running: s.jobs_running,
            pending_enrichment: s.pending_enrichment,
        }
    }
}

/// Insert one metrics snapshot.
pub async fn insert_metrics(client: &ClickHouseClient, snapshot: MetricsSnapshot) -> Result<()> {
    let row = MetricsRow::from(snapshot);
    let write_err = |e: clickhouse::error::Error| {
        Error::database(DbErrorCode::WriteFailed, format!("Metrics insert error: {}", e))
    };

    let mut insert = client.inner().insert("harvest_metrics").map_err(write_err)?;
    insert.write(&row).await.map_err(write_err)?;
    insert.end().await.map_err(write_err)?;

    Ok(())
}

/// Count stored snapshots.
pub async fn count_snapshots(client: &ClickHouseClient) -> Result<u64> {
    client
        .inner()
        .query("SELECT count() FROM harvest_metrics")
        .fetch_one()
        .await
        .map_err(|e| Error::database(DbErrorCode::QueryFailed, format!("Query error: {}", e)))
}
