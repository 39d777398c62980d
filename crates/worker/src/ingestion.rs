//! Merge-dedup ingestion of connector results.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use harvest_core::{
    CandidatePost, CategoryMerge, CorpusStore, Error, ErrorCategory, KeywordCategorizer, NewPost,
    Platform,
};
use serde::Serialize;
use source_connectors::{SourceConnector, SourceQuery};
use telemetry::{health, metrics, ComponentHealth};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Created,
    Merged { added: BTreeSet<String> },
    Unchanged,
}

/// A topic whose fetch failed.
#[derive(Debug, Clone, Serialize)]
pub struct TopicError {
    pub topic: String,
    pub category: ErrorCategory,
    pub message: String,
}

/// Totals for one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub platform: Platform,
    pub topics: usize,
    pub fetched: usize,
    pub created: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub topic_errors: Vec<TopicError>,
    /// The connector throttled us and the remaining topics were skipped
    pub rate_limited: bool,
}

impl IngestReport {
    fn new(platform: Platform, topics: usize) -> Self {
        Self {
            platform,
            topics,
            fetched: 0,
            created: 0,
            merged: 0,
            unchanged: 0,
            failed: 0,
            topic_errors: Vec::new(),
            rate_limited: false,
        }
    }

    /// Every topic failed for a reason other than throttling.
    pub fn all_topics_failed(&self) -> bool {
        self.topics > 0 && !self.rate_limited && self.topic_errors.len() == self.topics
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: fetched {}, created {}, merged {}, unchanged {}, failed {}, topic errors {}/{}",
            self.platform,
            self.fetched,
            self.created,
            self.merged,
            self.unchanged,
            self.failed,
            self.topic_errors.len(),
            self.topics,
        )?;
        if self.rate_limited {
            f.write_str(" (rate limited)")?;
        }
        Ok(())
    }
}

/// Topics for a Reddit run: each subreddit's newest listing, plus a
/// restricted search per keyword label when `keyword_search` is on.
pub fn reddit_topics(
    subreddits: &[String],
    categorizer: &KeywordCategorizer,
    keyword_search: bool,
) -> Vec<SourceQuery> {
    let terms = if keyword_search {
        categorizer.search_terms()
    } else {
        Vec::new()
    };

    subreddits
        .iter()
        .flat_map(|sub| {
            std::iter::once(SourceQuery::topic(sub.as_str())).chain(
                terms
                    .iter()
                    .map(move |(_, phrase)| SourceQuery::search_within(sub.as_str(), phrase.as_str())),
            )
        })
        .collect()
}

/// Topics for a Twitter run: one search per keyword.
pub fn twitter_topics(keywords: &[String]) -> Vec<SourceQuery> {
    keywords.iter().map(|k| SourceQuery::topic(k.as_str())).collect()
}

fn platform_health(platform: Platform) -> &'static ComponentHealth {
    match platform {
        Platform::Reddit => &health().reddit,
        Platform::Twitter => &health().twitter,
    }
}

/// Drives one connector over a fixed topic list into the store.
pub struct IngestionWorker {
    connector: Arc<dyn SourceConnector>,
    store: Arc<dyn CorpusStore>,
    categorizer: Arc<KeywordCategorizer>,
    topics: Vec<SourceQuery>,
    fetch_limit: u32,
}

impl IngestionWorker {
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        store: Arc<dyn CorpusStore>,
        categorizer: Arc<KeywordCategorizer>,
        topics: Vec<SourceQuery>,
        fetch_limit: u32,
    ) -> Self {
        Self {
            connector,
            store,
            categorizer,
            topics,
            fetch_limit,
        }
    }

    pub fn platform(&self) -> Platform {
        self.connector.platform()
    }

    pub fn topics(&self) -> &[SourceQuery] {
        &self.topics
    }

    /// Fetches every topic in order and merges the results.
    ///
    /// A rate limit ends the run early; any other topic failure is recorded
    /// and the next topic continues.
    pub async fn run(&self) -> IngestReport {
        let platform = self.platform();
        let m = metrics();
        let mut report = IngestReport::new(platform, self.topics.len());

        for query in &self.topics {
            let started = Instant::now();
            let fetched = self.connector.fetch(query, self.fetch_limit).await;
            m.connector_latency_ms
                .observe(started.elapsed().as_millis() as u64);

            let candidates = match fetched {
                Ok(candidates) => {
                    platform_health(platform).set_healthy();
                    candidates
                }
                Err(e) if e.is_rate_limited() => {
                    m.connector_rate_limits.inc();
                    platform_health(platform).set_unhealthy(e.to_string());
                    warn!(%platform, topic = %query, error = %e, "Rate limited, skipping remaining topics");
                    report.topic_errors.push(TopicError {
                        topic: query.to_string(),
                        category: e.category(),
                        message: e.to_string(),
                    });
                    report.rate_limited = true;
                    break;
                }
                Err(e) => {
                    m.connector_errors.inc();
                    platform_health(platform).set_unhealthy(e.to_string());
                    warn!(%platform, topic = %query, category = %e.category(), error = %e, "Fetch failed");
                    report.topic_errors.push(TopicError {
                        topic: query.to_string(),
                        category: e.category(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            debug!(%platform, topic = %query, count = candidates.len(), "Fetched candidates");
            report.fetched += candidates.len();
            m.posts_fetched.inc_by(candidates.len() as u64);

            for candidate in candidates {
                let platform_id = candidate.platform_id.clone();
                match self.ingest(candidate).await {
                    Ok(IngestOutcome::Created) => {
                        report.created += 1;
                        m.posts_created.inc();
                    }
                    Ok(IngestOutcome::Merged { added }) => {
                        debug!(%platform, %platform_id, ?added, "Merged new categories");
                        report.merged += 1;
                        m.posts_merged.inc();
                    }
                    Ok(IngestOutcome::Unchanged) => {
                        report.unchanged += 1;
                        m.posts_unchanged.inc();
                    }
                    Err(e) => {
                        report.failed += 1;
                        m.ingest_failures.inc();
                        warn!(%platform, %platform_id, error = %e, "Failed to store candidate");
                    }
                }
            }
        }

        info!(%report, "Ingestion run complete");
        report
    }

    /// Creates the post on first sight, otherwise unions its categories.
    ///
    /// Content and author fields of an existing post are never overwritten.
    pub async fn ingest(&self, candidate: CandidatePost) -> harvest_core::Result<IngestOutcome> {
        let labels = self.categorizer.categorize(&candidate.categorization_text());

        if let Some(existing) = self
            .store
            .find_by_platform_id(candidate.platform, &candidate.platform_id)
            .await?
        {
            return self.merge(existing.id, &labels).await;
        }

        let platform = candidate.platform;
        let platform_id = candidate.platform_id.clone();
        match self
            .store
            .create(NewPost::from_candidate(candidate, labels.clone()))
            .await
        {
            Ok(_) => Ok(IngestOutcome::Created),
            Err(Error::Conflict { .. }) => {
                // Lost a race with a concurrent create of the same key
                let existing = self
                    .store
                    .find_by_platform_id(platform, &platform_id)
                    .await?
                    .ok_or_else(|| {
                        Error::internal(format!(
                            "{}/{} conflicted but is not readable",
                            platform, platform_id
                        ))
                    })?;
                self.merge(existing.id, &labels).await
            }
            Err(e) => Err(e),
        }
    }

    async fn merge(
        &self,
        id: Uuid,
        labels: &BTreeSet<String>,
    ) -> harvest_core::Result<IngestOutcome> {
        if labels.is_empty() {
            return Ok(IngestOutcome::Unchanged);
        }
        Ok(match self.store.merge_categories(id, labels).await? {
            CategoryMerge::Unchanged => IngestOutcome::Unchanged,
            CategoryMerge::Updated { added } => IngestOutcome::Merged { added },
        })
    }
}
