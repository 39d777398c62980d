//! Connector configuration.

use serde::{Deserialize, Serialize};

/// Reddit script-app credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Reddit rejects requests with generic agents
    #[serde(default = "default_reddit_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_reddit_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_reddit_api_url")]
    pub api_url: String,
    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_reddit_user_agent() -> String {
    "post-harvester/0.1".to_string()
}

fn default_reddit_auth_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_reddit_api_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl RedditConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: default_reddit_user_agent(),
            auth_url: default_reddit_auth_url(),
            api_url: default_reddit_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Twitter API v2 credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default = "default_twitter_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_twitter_api_url() -> String {
    "https://api.twitter.com".to_string()
}

impl TwitterConfig {
    pub fn is_configured(&self) -> bool {
        !self.bearer_token.is_empty()
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: String::new(),
            api_url: default_twitter_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
