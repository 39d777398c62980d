//! Harvested post model.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::analysis::Enrichment;
use crate::error::{Error, ValidationErrorCode};
use crate::limits::MAX_EXTRA_DATA_BYTES;

/// Source platform a post was harvested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reddit => "reddit",
            Self::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reddit" => Ok(Self::Reddit),
            "twitter" => Ok(Self::Twitter),
            other => Err(Error::validation_code(
                ValidationErrorCode::InvalidFilter,
                format!("Invalid platform '{}'. Available options: reddit, twitter", other),
            )),
        }
    }
}

/// Review status of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    New,
    Viewed,
    Responded,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Viewed => "viewed",
            Self::Responded => "responded",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "viewed" => Ok(Self::Viewed),
            "responded" => Ok(Self::Responded),
            other => Err(Error::validation_code(
                ValidationErrorCode::InvalidFilter,
                format!(
                    "Invalid status '{}'. Available options: new, viewed, responded",
                    other
                ),
            )),
        }
    }
}

/// Sentiment label, used for the overall post and for each product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            "mixed" => Ok(Self::Mixed),
            other => Err(Error::validation_code(
                ValidationErrorCode::InvalidFilter,
                format!(
                    "Invalid sentiment '{}'. Available options: positive, negative, neutral, mixed",
                    other
                ),
            )),
        }
    }
}

/// A post as returned by a source connector, before it touches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePost {
    pub platform: Platform,
    /// Preserved exactly as returned by the source
    pub platform_id: String,
    pub url: String,
    pub author: Option<String>,
    pub author_id: Option<String>,
    pub author_avatar_url: Option<String>,
    pub title: Option<String>,
    /// May be empty
    pub text: String,
    /// Subreddit or search keyword the post was found under
    pub source_name: String,
    /// Raw platform payload, stored as `additional_data`
    pub raw_metadata: serde_json::Value,
}

impl CandidatePost {
    /// Text the categorizer runs over: title and body together.
    pub fn categorization_text(&self) -> String {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() && title != self.text => {
                format!("{}\n\n{}", title, self.text)
            }
            _ => self.text.clone(),
        }
    }
}

/// Validates free-form JSON size.
pub(crate) fn validate_json_size(value: &serde_json::Value) -> Result<(), ValidationError> {
    if value.is_null() {
        return Ok(());
    }

    let size = serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0);

    if size > MAX_EXTRA_DATA_BYTES {
        let mut err = ValidationError::new("json_too_large");
        err.message = Some(
            format!(
                "payload {}KB exceeds {}KB limit",
                size / 1024,
                MAX_EXTRA_DATA_BYTES / 1024
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Payload for creating a post, either from a connector or the API.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPost {
    pub platform: Platform,
    #[validate(length(min = 1, max = 128))]
    pub platform_id: String,
    #[validate(length(max = 2048))]
    pub platform_url: Option<String>,
    #[validate(length(max = 128))]
    pub author_username: Option<String>,
    #[validate(length(max = 128))]
    pub author_platform_id: Option<String>,
    #[validate(length(max = 2048))]
    pub author_avatar_url: Option<String>,
    #[serde(default)]
    #[validate(length(max = 40000))]
    pub content_text: String,
    /// Defaults to the platform name
    #[validate(length(max = 64))]
    pub source_type: Option<String>,
    #[validate(length(max = 256))]
    pub source_name: Option<String>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub additional_data: serde_json::Value,
}

impl NewPost {
    /// Builds a create payload from a connector candidate and its labels.
    pub fn from_candidate(candidate: CandidatePost, categories: BTreeSet<String>) -> Self {
        Self {
            platform: candidate.platform,
            source_type: Some(candidate.platform.as_str().to_string()),
            platform_id: candidate.platform_id,
            platform_url: Some(candidate.url).filter(|u| !u.is_empty()),
            author_username: candidate.author,
            author_platform_id: candidate.author_id,
            author_avatar_url: candidate.author_avatar_url,
            content_text: candidate.text,
            source_name: Some(candidate.source_name),
            categories,
            additional_data: candidate.raw_metadata,
        }
    }
}

/// Result of merging categories into an existing post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryMerge {
    /// The union equals the stored set; nothing was written.
    Unchanged,
    /// New labels were added.
    Updated { added: BTreeSet<String> },
}

/// A stored post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Store-assigned id used on the query surface
    pub id: Uuid,
    pub platform: Platform,
    pub platform_id: String,
    pub platform_url: Option<String>,
    pub author_username: Option<String>,
    pub author_platform_id: Option<String>,
    pub author_avatar_url: Option<String>,
    pub content_text: String,
    pub source_type: String,
    pub source_name: Option<String>,
    pub categories: BTreeSet<String>,
    pub status: PostStatus,
    /// Gated overall sentiment, or a manual override
    pub sentiment: Option<Sentiment>,
    /// Primary feedback category, or a manual override
    pub category: Option<String>,
    pub urgency: i32,
    pub extra_data: serde_json::Value,
    pub additional_data: serde_json::Value,
    /// All analysis results, or none
    pub enrichment: Option<Enrichment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Creates a fresh post with `status = new`.
    pub fn from_new(new: NewPost) -> Self {
        let now = Utc::now();
        let source_type = new
            .source_type
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| new.platform.as_str().to_string());
        Self {
            id: Uuid::new_v4(),
            platform: new.platform,
            platform_id: new.platform_id,
            platform_url: new.platform_url,
            author_username: new.author_username,
            author_platform_id: new.author_platform_id,
            author_avatar_url: new.author_avatar_url,
            content_text: new.content_text,
            source_type,
            source_name: new.source_name,
            categories: new.categories,
            status: PostStatus::New,
            sentiment: None,
            category: None,
            urgency: 0,
            extra_data: serde_json::Value::Object(Default::default()),
            additional_data: new.additional_data,
            enrichment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }

    /// Whether enrichment should even be attempted.
    pub fn has_content(&self) -> bool {
        !self.content_text.trim().is_empty()
    }

    /// Unions `labels` into the stored categories.
    ///
    /// Never removes a label. Touches `updated_at` only when something was added.
    pub fn merge_categories(&mut self, labels: &BTreeSet<String>) -> CategoryMerge {
        let added: BTreeSet<String> = labels.difference(&self.categories).cloned().collect();
        if added.is_empty() {
            return CategoryMerge::Unchanged;
        }
        self.categories.extend(added.iter().cloned());
        self.updated_at = Utc::now();
        CategoryMerge::Updated { added }
    }

    /// Writes all analysis results at once.
    ///
    /// Also denormalises the gated sentiment and primary category.
    pub fn apply_enrichment(&mut self, enrichment: Enrichment) {
        self.sentiment = Some(enrichment.sentiment.sentiment);
        self.category = Some(enrichment.categories.category.clone());
        self.enrichment = Some(enrichment);
        self.updated_at = Utc::now();
    }

    /// Applies a partial update. Categories are merged, never replaced.
    pub fn apply_update(&mut self, update: PostUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(sentiment) = update.sentiment {
            self.sentiment = Some(sentiment);
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(urgency) = update.urgency {
            self.urgency = urgency;
        }
        if let Some(categories) = update.categories {
            self.categories.extend(categories);
        }
        if let Some(extra) = update.extra_data {
            self.extra_data = extra;
        }
        if let Some(additional) = update.additional_data {
            self.additional_data = additional;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update accepted on the query surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PostUpdate {
    pub status: Option<PostStatus>,
    pub sentiment: Option<Sentiment>,
    #[validate(length(min = 1, max = 64))]
    pub category: Option<String>,
    #[validate(range(min = 0, max = 10))]
    pub urgency: Option<i32>,
    /// Merged into the existing set
    pub categories: Option<BTreeSet<String>>,
    #[validate(custom(function = "validate_json_size"))]
    pub extra_data: Option<serde_json::Value>,
    #[validate(custom(function = "validate_json_size"))]
    pub additional_data: Option<serde_json::Value>,
}
