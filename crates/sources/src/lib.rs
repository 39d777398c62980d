//! Source connectors for the post harvester.
//!
//! Each connector turns one query against its platform into an ordered list
//! of [`CandidatePost`]s. "No results" is an empty list, never an error.

pub mod config;
pub mod error;
pub mod reddit;
pub mod twitter;

use std::fmt;

use async_trait::async_trait;
use harvest_core::{CandidatePost, Platform};

pub use config::{RedditConfig, TwitterConfig};
pub use error::{Result, SourceError};
pub use reddit::RedditConnector;
pub use twitter::TwitterConnector;

/// One unit of work for a connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    /// Community (subreddit) or search keyword
    pub topic: String,
    /// Search terms inside the community, if any
    pub search: Option<String>,
}

impl SourceQuery {
    /// The newest posts of a community, or a plain keyword search.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            search: None,
        }
    }

    /// A keyword search restricted to one community.
    pub fn search_within(topic: impl Into<String>, terms: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            search: Some(terms.into()),
        }
    }
}

impl fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.search {
            Some(terms) => write!(f, "{} (search: {})", self.topic, terms),
            None => f.write_str(&self.topic),
        }
    }
}

#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetches at most `limit` candidates, preserving source order.
    async fn fetch(&self, query: &SourceQuery, limit: u32) -> Result<Vec<CandidatePost>>;
}
