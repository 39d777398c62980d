//! Reddit connector (OAuth client credentials, read-only).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use harvest_core::limits::REDDIT_MAX_RESULTS;
use harvest_core::{CandidatePost, Platform};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::config::RedditConfig;
use crate::error::{error_for_status, Result, SourceError};
use crate::{SourceConnector, SourceQuery};

/// Refresh the token this long before Reddit says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Submission {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    is_self: bool,
    author: Option<String>,
    author_fullname: Option<String>,
    #[serde(default)]
    permalink: String,
}

/// Parses a listing body into candidates, in listing order.
///
/// Self posts carry their body as text; link posts carry their title.
pub fn parse_listing(body: &str, source_name: &str) -> Result<Vec<CandidatePost>> {
    let listing: Listing = serde_json::from_str(body)?;

    listing
        .data
        .children
        .into_iter()
        .map(|child| {
            let submission: Submission = serde_json::from_value(child.data.clone())?;
            let text = if submission.is_self && !submission.selftext.trim().is_empty() {
                submission.selftext
            } else {
                submission.title.clone()
            };
            let url = if submission.permalink.is_empty() {
                String::new()
            } else {
                format!("https://reddit.com{}", submission.permalink)
            };
            Ok(CandidatePost {
                platform: Platform::Reddit,
                platform_id: submission.id,
                url,
                author: Some(
                    submission
                        .author
                        .unwrap_or_else(|| "[deleted]".to_string()),
                ),
                author_id: submission.author_fullname,
                author_avatar_url: None,
                title: Some(submission.title).filter(|t| !t.is_empty()),
                text,
                source_name: source_name.to_string(),
                raw_metadata: child.data,
            })
        })
        .collect()
}

/// Reddit connector.
pub struct RedditConnector {
    client: reqwest::Client,
    config: RedditConfig,
    token: Mutex<Option<CachedToken>>,
}

impl RedditConnector {
    pub fn new(config: RedditConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(SourceError::Auth("reddit client id/secret not set".to_string()));
        }
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    /// Returns a valid bearer token, fetching a new one if needed.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/api/v1/access_token", self.config.auth_url);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_for_status("reddit", resp).await);
        }

        let token: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        debug!(expires_in = token.expires_in, "Obtained Reddit access token");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn listing_url(&self, query: &SourceQuery, limit: u32) -> Result<Url> {
        let base = format!("{}/", self.config.api_url.trim_end_matches('/'));
        let base = Url::parse(&base).map_err(|e| SourceError::Transport(e.to_string()))?;
        let path = match query.search {
            Some(_) => format!("r/{}/search", query.topic),
            None => format!("r/{}/new", query.topic),
        };
        let mut url = base
            .join(&path)
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("limit", &limit.to_string())
                .append_pair("raw_json", "1");
            if let Some(terms) = &query.search {
                pairs
                    .append_pair("q", terms)
                    .append_pair("restrict_sr", "1")
                    .append_pair("sort", "new");
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SourceConnector for RedditConnector {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn fetch(&self, query: &SourceQuery, limit: u32) -> Result<Vec<CandidatePost>> {
        let limit = limit.clamp(1, REDDIT_MAX_RESULTS);
        let token = self.access_token().await?;
        let url = self.listing_url(query, limit)?;

        let started = Instant::now();
        let resp = self.client.get(url).bearer_auth(&token).send().await?;
        telemetry::metrics()
            .connector_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        if !resp.status().is_success() {
            let err = error_for_status("reddit", resp).await;
            if matches!(err, SourceError::Auth(_)) {
                // Force a fresh token next time
                *self.token.lock().await = None;
            }
            return Err(err);
        }

        let body = resp.text().await?;
        let mut posts = parse_listing(&body, &query.topic)?;
        posts.truncate(limit as usize);

        info!(query = %query, count = posts.len(), "Fetched Reddit posts");
        Ok(posts)
    }
}
