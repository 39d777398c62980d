//! Internal metrics collection.
//!
//! Collects pipeline metrics in-memory; the `flush-metrics` job writes
//! snapshots to ClickHouse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        // Saturate at zero; a stray dec must not wrap
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Histogram for latency tracking.
///
/// Bounds run from 5ms to 2 minutes: provider calls and job runs sit in the
/// upper half, store reads in the lower.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [
        5, 25, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000, 120_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper bound, count)` per bucket.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Enrichment failures, one counter per error category.
#[derive(Debug, Default)]
pub struct ErrorCounters {
    pub transport: Counter,
    pub timeout: Counter,
    pub malformed_response: Counter,
    pub rate_limit: Counter,
    pub service: Counter,
    pub storage: Counter,
    pub other: Counter,
}

impl ErrorCounters {
    /// Increments the counter named by an error category string.
    pub fn record(&self, category: &str) {
        match category {
            "transport" => self.transport.inc(),
            "timeout" => self.timeout.inc(),
            "malformed_response" => self.malformed_response.inc(),
            "rate_limit" => self.rate_limit.inc(),
            "service" => self.service.inc(),
            "storage" => self.storage.inc(),
            _ => self.other.inc(),
        }
    }

    pub fn total(&self) -> u64 {
        self.transport.get()
            + self.timeout.get()
            + self.malformed_response.get()
            + self.rate_limit.get()
            + self.service.get()
            + self.storage.get()
            + self.other.get()
    }
}

/// Collected metrics for the harvester.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub posts_fetched: Counter,
    pub posts_created: Counter,
    pub posts_merged: Counter,
    pub posts_unchanged: Counter,
    pub ingest_failures: Counter,
    pub connector_errors: Counter,
    pub connector_rate_limits: Counter,

    // Enrichment
    pub posts_enriched: Counter,
    pub posts_skipped: Counter,
    pub sentiment_suppressed: Counter,
    pub analysis_retries: Counter,
    pub enrichment_errors: ErrorCounters,

    // Jobs
    pub job_runs: Counter,
    pub job_failures: Counter,
    pub job_skipped_overlaps: Counter,

    // Latency histograms
    pub connector_latency_ms: Histogram,
    pub analysis_latency_ms: Histogram,
    pub store_latency_ms: Histogram,
    pub job_duration_ms: Histogram,

    // Gauges
    pub jobs_running: Gauge,
    pub pending_enrichment: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
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

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            posts_fetched: self.posts_fetched.get(),
            posts_created: self.posts_created.get(),
            posts_merged: self.posts_merged.get(),
            posts_unchanged: self.posts_unchanged.get(),
            ingest_failures: self.ingest_failures.get(),
            connector_errors: self.connector_errors.get(),
            connector_rate_limits: self.connector_rate_limits.get(),
            posts_enriched: self.posts_enriched.get(),
            posts_skipped: self.posts_skipped.get(),
            sentiment_suppressed: self.sentiment_suppressed.get(),
            analysis_retries: self.analysis_retries.get(),
            enrichment_errors: self.enrichment_errors.total(),
            enrichment_timeouts: self.enrichment_errors.timeout.get(),
            enrichment_malformed: self.enrichment_errors.malformed_response.get(),
            job_runs: self.job_runs.get(),
            job_failures: self.job_failures.get(),
            job_skipped_overlaps: self.job_skipped_overlaps.get(),
            connector_latency_mean_ms: self.connector_latency_ms.mean(),
            analysis_latency_mean_ms: self.analysis_latency_ms.mean(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
            job_duration_mean_ms: self.job_duration_ms.mean(),
            jobs_running: self.jobs_running.get(),
            pending_enrichment: self.pending_enrichment.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
