//! ClickHouse table schemas.
//!
//! - `posts` is a ReplacingMergeTree keyed by `(platform, platform_id)`;
//!   every write inserts a whole row and the newest `updated_at` wins
//! - `user_actions` uses the same scheme keyed by
//!   `(user_ref, post_id, action_type)`
//! - `is_deleted` marks tombstones written by deletes
//! - LowCardinality for enum-like fields
//! - DateTime64(3) for millisecond precision
//! - JSON blobs stored as String

/// SQL for creating the posts table.
pub const CREATE_POSTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id String,
    platform LowCardinality(String),
    platform_id String,
    platform_url Nullable(String),

    -- Author
    author_username Nullable(String),
    author_platform_id Nullable(String),
    author_avatar_url Nullable(String),

    -- Content
    content_text String,
    source_type LowCardinality(String),
    source_name Nullable(String),
    categories Array(String),

    -- Review state
    status LowCardinality(String),
    sentiment LowCardinality(Nullable(String)),
    category Nullable(String),
    urgency Int32,
    extra_data String,
    additional_data String,

    -- Enrichment (all set together, or all NULL)
    openai_products Nullable(String),
    openai_sentiment Nullable(String),
    openai_categories Nullable(String),
    openai_confidence Nullable(Float64),
    openai_analysis_timestamp Nullable(DateTime64(3)),

    created_at DateTime64(3),
    updated_at DateTime64(3),
    is_deleted UInt8 DEFAULT 0
)
ENGINE = ReplacingMergeTree(updated_at, is_deleted)
ORDER BY (platform, platform_id)
SETTINGS index_granularity = 8192
"#;

/// SQL for creating the user actions table.
pub const CREATE_USER_ACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_actions (
    id String,
    user_ref String,
    post_id String,
    action_type LowCardinality(String),
    metadata String,
    created_at DateTime64(3),
    updated_at DateTime64(3),
    is_deleted UInt8 DEFAULT 0
)
ENGINE = ReplacingMergeTree(updated_at, is_deleted)
ORDER BY (user_ref, post_id, action_type)
SETTINGS index_granularity = 8192
"#;

/// SQL for creating the metrics snapshot table.
///
/// Stores pipeline metrics written by the `flush-metrics` job.
pub const CREATE_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS harvest_metrics (
    timestamp DateTime64(3),
    posts_fetched UInt64,
    posts_created UInt64,
    posts_merged UInt64,
    posts_unchanged UInt64,
    ingest_failures UInt64,
    connector_errors UInt64,
    connector_rate_limits UInt64,
    posts_enriched UInt64,
    posts_skipped UInt64,
    sentiment_suppressed UInt64,
    analysis_retries UInt64,
    enrichment_errors UInt64,
    enrichment_timeouts UInt64,
    enrichment_malformed UInt64,
    job_runs UInt64,
    job_failures UInt64,
    job_skipped_overlaps UInt64,
    connector_latency_mean_ms Float64,
    analysis_latency_mean_ms Float64,
    store_latency_mean_ms Float64,
    job_duration_mean_ms Float64,
    jobs_running UInt64,
    pending_enrichment UInt64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY timestamp
TTL toDateTime(timestamp) + INTERVAL 30 DAY
"#;

/// SQL for creating the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// Table creation statements, run against the harvester database.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_POSTS_TABLE,
        CREATE_USER_ACTIONS_TABLE,
        CREATE_METRICS_TABLE,
    ]
}
