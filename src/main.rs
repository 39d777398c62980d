//! Post Harvester
//!
//! Periodically harvests posts about monitored developer tools:
//! - Reddit and Twitter connectors feeding a merge-dedup corpus in ClickHouse
//! - Keyword categorization on ingest
//! - Three-stage OpenAI enrichment with a confidence gate
//! - HTTP API for querying the corpus and triggering jobs

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use analysis_client::OpenAiConfig;
use api::{router, AppState};
use clickhouse_store::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use harvest_core::{CorpusStore, KeywordCategorizer};
use source_connectors::{RedditConfig, RedditConnector, TwitterConfig, TwitterConnector};
use telemetry::{health, init_tracing_from_env};
use worker::jobs::{INGEST_REDDIT, INGEST_TWITTER};
use worker::{
    reddit_topics, twitter_topics, EnrichJob, EnrichmentWorker, IngestJob, IngestionWorker,
    MetricsFlushJob, PipelineConfig, Scheduler,
};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    reddit: RedditConfig,

    #[serde(default)]
    twitter: TwitterConfig,

    #[serde(default)]
    openai: OpenAiConfig,

    #[serde(default)]
    pipeline: PipelineConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            clickhouse: ClickHouseConfig::default(),
            reddit: RedditConfig::default(),
            twitter: TwitterConfig::default(),
            openai: OpenAiConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Post Harvester v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        dev_mode = config.pipeline.dev_mode,
        fetch_limit = config.pipeline.fetch_limit(),
        reddit = config.reddit.is_configured(),
        twitter = config.twitter.is_configured(),
        openai = config.openai.is_configured(),
        "Loaded configuration"
    );

    let categorizer = Arc::new(load_categorizer(&config.pipeline));
    info!(labels = ?categorizer.list_labels(), "Keyword categorizer ready");

    // ClickHouse store
    let clickhouse = ClickHouseClient::new(config.clickhouse.clone());
    if let Err(e) = clickhouse.ensure_schema().await {
        // The tables may already exist; readiness reports the store state
        error!(error = %e, "Failed to initialize ClickHouse schema");
    }
    probe_store(&clickhouse).await;
    let store: Arc<dyn CorpusStore> = Arc::new(ClickHouseStore::new(clickhouse.clone()));

    let scheduler = build_scheduler(&config, store.clone(), categorizer.clone(), clickhouse)?;
    info!(jobs = ?scheduler.job_names(), "Starting scheduler");
    let scheduler = scheduler.start();

    let state = AppState::new(
        store,
        categorizer,
        config.pipeline.feedback_categories.clone(),
        scheduler.clone(),
    );
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    // Let in-flight jobs finish
    scheduler.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Registers a job per configured collaborator.
fn build_scheduler(
    config: &Config,
    store: Arc<dyn CorpusStore>,
    categorizer: Arc<KeywordCategorizer>,
    clickhouse: ClickHouseClient,
) -> Result<Scheduler> {
    let pipeline = &config.pipeline;
    let mut scheduler = Scheduler::new();

    if config.reddit.is_configured() {
        let connector = RedditConnector::new(config.reddit.clone())
            .context("Failed to create Reddit connector")?;
        let topics = reddit_topics(&pipeline.subreddits, &categorizer, pipeline.keyword_search);
        let worker = IngestionWorker::new(
            Arc::new(connector),
            store.clone(),
            categorizer.clone(),
            topics,
            pipeline.fetch_limit(),
        );
        scheduler = scheduler.register(
            IngestJob::new(INGEST_REDDIT, worker),
            pipeline.reddit_interval(),
        )?;
    } else {
        health().reddit.disable("Reddit credentials not configured");
        warn!("Reddit credentials not set, Reddit ingestion disabled");
    }

    if config.twitter.is_configured() {
        let connector = TwitterConnector::new(config.twitter.clone())
            .context("Failed to create Twitter connector")?;
        let worker = IngestionWorker::new(
            Arc::new(connector),
            store.clone(),
            categorizer.clone(),
            twitter_topics(&pipeline.twitter_keywords),
            pipeline.fetch_limit(),
        );
        scheduler = scheduler.register(
            IngestJob::new(INGEST_TWITTER, worker),
            pipeline.twitter_interval(),
        )?;
    } else {
        health().twitter.disable("Twitter bearer token not configured");
        warn!("Twitter bearer token not set, Twitter ingestion disabled");
    }

    if config.openai.is_configured() {
        let provider = analysis_client::openai_provider(config.openai.clone())
            .context("Failed to create OpenAI provider")?;
        let worker = EnrichmentWorker::new(
            store,
            Arc::new(provider),
            pipeline.feedback_categories.clone(),
            pipeline.min_confidence,
            pipeline.max_posts_per_batch,
        );
        scheduler = scheduler.register(EnrichJob::new(worker), pipeline.enrichment_interval())?;
    } else {
        health().analysis.disable("OpenAI API key not configured");
        warn!("OpenAI API key not set, enrichment disabled");
    }

    Ok(scheduler.register(
        MetricsFlushJob::new(clickhouse),
        pipeline.metrics_flush_interval(),
    )?)
}

/// Loads the keyword table, falling back to the built-in one.
fn load_categorizer(pipeline: &PipelineConfig) -> KeywordCategorizer {
    let Some(path) = pipeline.keywords_path.as_deref() else {
        return KeywordCategorizer::default();
    };
    match KeywordCategorizer::from_json_file(path) {
        Ok(categorizer) => {
            info!(path, "Loaded keyword table");
            categorizer
        }
        Err(e) => {
            warn!(path, error = %e, "Failed to load keyword table, using built-in keywords");
            KeywordCategorizer::default()
        }
    }
}

/// Layers defaults, `config/default.toml` and `HARVESTER__*` variables.
fn load_config() -> Result<Config> {
    let layered = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("HARVESTER")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = layered
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    apply_env_overrides(&mut config);
    config
        .pipeline
        .validate()
        .context("Invalid pipeline configuration")?;
    Ok(config)
}

/// Flat variables win over the layered configuration. Credentials keep
/// their conventional names.
fn apply_env_overrides(config: &mut Config) {
    let var = |name: &str| std::env::var(name).ok();

    let overrides = [
        ("REDDIT_CLIENT_ID", &mut config.reddit.client_id),
        ("REDDIT_CLIENT_SECRET", &mut config.reddit.client_secret),
        ("REDDIT_USER_AGENT", &mut config.reddit.user_agent),
        ("TWITTER_BEARER_TOKEN", &mut config.twitter.bearer_token),
        ("OPENAI_API_KEY", &mut config.openai.api_key),
        ("HARVESTER_CLICKHOUSE_URL", &mut config.clickhouse.url),
        ("HARVESTER_CLICKHOUSE_DATABASE", &mut config.clickhouse.database),
    ];
    for (name, slot) in overrides {
        if let Some(value) = var(name) {
            *slot = value;
        }
    }

    if let Some(username) = var("HARVESTER_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Some(password) = var("HARVESTER_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }
}

/// Seeds store health before the first request or job.
async fn probe_store(clickhouse: &ClickHouseClient) {
    if clickhouse.ping().await {
        health().clickhouse.set_healthy();
        info!(url = %clickhouse.config().url, "ClickHouse reachable");
    } else {
        health().clickhouse.set_unhealthy("Connection failed");
        error!(url = %clickhouse.config().url, "ClickHouse unreachable");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
