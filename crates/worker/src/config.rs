//! Pipeline configuration.

use std::time::Duration;

use harvest_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Scheduling and batching options for the harvest pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_fetch_interval")]
    pub reddit_fetch_interval_secs: u64,
    #[serde(default = "default_fetch_interval")]
    pub twitter_fetch_interval_secs: u64,
    #[serde(default = "default_enrichment_interval")]
    pub enrichment_interval_secs: u64,
    #[serde(default = "default_metrics_flush_interval")]
    pub metrics_flush_interval_secs: u64,
    #[serde(default = "default_max_posts_per_fetch")]
    pub max_posts_per_fetch: u32,
    #[serde(default = "default_max_posts_per_batch")]
    pub max_posts_per_batch: usize,
    /// Sentiment below this confidence is reported as neutral
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_true")]
    pub dev_mode: bool,
    /// Fetch limit used instead of `max_posts_per_fetch` in dev mode
    #[serde(default = "default_dev_post_limit")]
    pub dev_post_limit: u32,
    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,
    #[serde(default = "default_twitter_keywords")]
    pub twitter_keywords: Vec<String>,
    /// Also search each subreddit for every keyword label
    #[serde(default = "default_true")]
    pub keyword_search: bool,
    /// JSON keyword table; the built-in table is used when unset or unreadable
    #[serde(default)]
    pub keywords_path: Option<String>,
    #[serde(default = "default_feedback_categories")]
    pub feedback_categories: Vec<String>,
}

fn default_fetch_interval() -> u64 {
    3600
}

fn default_enrichment_interval() -> u64 {
    7200
}

fn default_metrics_flush_interval() -> u64 {
    60
}

fn default_max_posts_per_fetch() -> u32 {
    25
}

fn default_max_posts_per_batch() -> usize {
    5
}

fn default_min_confidence() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_dev_post_limit() -> u32 {
    3
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_subreddits() -> Vec<String> {
    strings(&[
        "programming",
        "vscode",
        "webdev",
        "ArtificialIntelligence",
        "javascript",
        "Python",
        "reactjs",
        "coding",
        "AItools",
    ])
}

fn default_twitter_keywords() -> Vec<String> {
    strings(&[
        "cursor code editor",
        "windsurf IDE",
        "coding IDE",
        "AI programming tools",
        "Python IDE",
        "JavaScript editor",
        "VSCode alternative",
        "programming tools",
        "code IDE",
        "software development environment",
    ])
}

fn default_feedback_categories() -> Vec<String> {
    strings(&[
        "Bug Reports",
        "Feature Requests",
        "General Feedback",
        "Questions",
        "Praise",
        "Issues",
    ])
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reddit_fetch_interval_secs: default_fetch_interval(),
            twitter_fetch_interval_secs: default_fetch_interval(),
            enrichment_interval_secs: default_enrichment_interval(),
            metrics_flush_interval_secs: default_metrics_flush_interval(),
            max_posts_per_fetch: default_max_posts_per_fetch(),
            max_posts_per_batch: default_max_posts_per_batch(),
            min_confidence: default_min_confidence(),
            dev_mode: true,
            dev_post_limit: default_dev_post_limit(),
            subreddits: default_subreddits(),
            twitter_keywords: default_twitter_keywords(),
            keyword_search: true,
            keywords_path: None,
            feedback_categories: default_feedback_categories(),
        }
    }
}

impl PipelineConfig {
    /// Rejects values the scheduler and workers cannot run with.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("reddit_fetch_interval_secs", self.reddit_fetch_interval_secs),
            ("twitter_fetch_interval_secs", self.twitter_fetch_interval_secs),
            ("enrichment_interval_secs", self.enrichment_interval_secs),
            ("metrics_flush_interval_secs", self.metrics_flush_interval_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(Error::config(format!("{} must be at least 1", name)));
            }
        }

        let counts = [
            ("max_posts_per_fetch", self.max_posts_per_fetch as usize),
            ("dev_post_limit", self.dev_post_limit as usize),
            ("max_posts_per_batch", self.max_posts_per_batch),
        ];
        for (name, count) in counts {
            if count == 0 {
                return Err(Error::config(format!("{} must be at least 1", name)));
            }
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::config(format!(
                "min_confidence must be between 0 and 1, got {}",
                self.min_confidence
            )));
        }

        if self.feedback_categories.is_empty() {
            return Err(Error::config("feedback_categories must not be empty"));
        }
        if self.feedback_categories.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::config("feedback_categories must not contain blank names"));
        }
        Ok(())
    }

    /// Posts requested per connector call.
    pub fn fetch_limit(&self) -> u32 {
        if self.dev_mode {
            self.dev_post_limit
        } else {
            self.max_posts_per_fetch
        }
    }

    pub fn reddit_interval(&self) -> Duration {
        Duration::from_secs(self.reddit_fetch_interval_secs)
    }

    pub fn twitter_interval(&self) -> Duration {
        Duration::from_secs(self.twitter_fetch_interval_secs)
    }

    pub fn enrichment_interval(&self) -> Duration {
        Duration::from_secs(self.enrichment_interval_secs)
    }

    pub fn metrics_flush_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_flush_interval_secs)
    }
}
