//! Background work for the post harvester.
//!
//! - Scheduler (interval dispatch, one run per job at a time)
//! - Ingestion (connector → categorizer → merge-dedup into the store)
//! - Enrichment (three-stage analysis with a confidence gate)
//! - Jobs wiring the workers into the scheduler

pub mod config;
pub mod enrichment;
pub mod ingestion;
pub mod jobs;
pub mod scheduler;

pub use config::PipelineConfig;
pub use enrichment::{EnrichmentReport, EnrichmentWorker, PostOutcome};
pub use ingestion::{reddit_topics, twitter_topics, IngestOutcome, IngestReport, IngestionWorker};
pub use jobs::{EnrichJob, IngestJob, MetricsFlushJob};
pub use scheduler::{
    Job, JobOutcome, JobStatus, Scheduler, SchedulerError, SchedulerHandle, TriggerResult,
};
