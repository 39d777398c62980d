//! Twitter connector (API v2 recent search).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use harvest_core::limits::{TWITTER_MAX_RESULTS, TWITTER_MIN_RESULTS};
use harvest_core::{CandidatePost, Platform};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::config::TwitterConfig;
use crate::error::{error_for_status, Result, SourceError};
use crate::{SourceConnector, SourceQuery};

const TWEET_FIELDS: &str = "author_id,created_at,entities,public_metrics,lang";
const USER_FIELDS: &str = "username,name,profile_image_url";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// Absent when nothing matched
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: String,
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: Option<String>,
}

/// Parses a recent-search body into candidates, in response order.
///
/// Tweets whose author is missing from the expansions are dropped.
pub fn parse_search(body: &str, source_name: &str) -> Result<Vec<CandidatePost>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let users: HashMap<&str, &User> = response
        .includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u))
        .collect();

    let mut posts = Vec::with_capacity(response.data.len());
    for raw in &response.data {
        let tweet: Tweet = serde_json::from_value(raw.clone())?;
        let Some(user) = tweet.author_id.as_deref().and_then(|id| users.get(id)) else {
            warn!(tweet_id = %tweet.id, "Author not found in expansions, skipping tweet");
            continue;
        };

        posts.push(CandidatePost {
            platform: Platform::Twitter,
            url: format!("https://twitter.com/{}/status/{}", user.username, tweet.id),
            platform_id: tweet.id,
            author: Some(user.username.clone()),
            author_id: Some(user.id.clone()),
            author_avatar_url: user.profile_image_url.clone(),
            title: None,
            text: tweet.text,
            source_name: source_name.to_string(),
            raw_metadata: serde_json::json!({
                "author_name": user.name,
                "raw_tweet": raw,
            }),
        });
    }
    Ok(posts)
}

/// Twitter connector.
pub struct TwitterConnector {
    client: reqwest::Client,
    config: TwitterConfig,
}

impl TwitterConnector {
    pub fn new(config: TwitterConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(SourceError::Auth("twitter bearer token not set".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn search_url(&self, query: &SourceQuery, max_results: u32) -> Result<Url> {
        let terms = query.search.as_deref().unwrap_or(&query.topic);
        let mut url = Url::parse(&format!(
            "{}/2/tweets/search/recent",
            self.config.api_url.trim_end_matches('/')
        ))
        .map_err(|e| SourceError::Transport(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("query", terms)
            .append_pair("max_results", &max_results.to_string())
            .append_pair("tweet.fields", TWEET_FIELDS)
            .append_pair("expansions", "author_id")
            .append_pair("user.fields", USER_FIELDS);
        Ok(url)
    }
}

#[async_trait]
impl SourceConnector for TwitterConnector {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch(&self, query: &SourceQuery, limit: u32) -> Result<Vec<CandidatePost>> {
        // The API rejects page sizes below 10; trim locally instead
        let max_results = limit.clamp(TWITTER_MIN_RESULTS, TWITTER_MAX_RESULTS);
        let url = self.search_url(query, max_results)?;

        let started = Instant::now();
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.config.bearer_token)
            .send()
            .await?;
        telemetry::metrics()
            .connector_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        if !resp.status().is_success() {
            return Err(error_for_status("twitter", resp).await);
        }

        let body = resp.text().await?;
        let mut posts = parse_search(&body, &query.topic)?;
        posts.truncate(limit.min(TWITTER_MAX_RESULTS) as usize);

        info!(query = %query, count = posts.len(), "Fetched tweets");
        Ok(posts)
    }
}
