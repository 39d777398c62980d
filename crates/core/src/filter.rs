//! Corpus listing filters.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::categorizer::KeywordCategorizer;
use crate::error::{Error, Result, ValidationErrorCode};
use crate::limits::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::post::{Platform, Post, PostStatus, Sentiment};

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

/// Filters for listing posts. All set filters must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PostFilter {
    #[serde(default)]
    pub platforms: Vec<Platform>,
    pub sentiment: Option<Sentiment>,
    pub category: Option<String>,
    pub source_type: Option<String>,
    pub source_name: Option<String>,
    pub status: Option<PostStatus>,
    /// Must be one of the categorizer's labels
    pub keyword_category: Option<String>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000))]
    pub limit: u32,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            sentiment: None,
            category: None,
            source_type: None,
            source_name: None,
            status: None,
            keyword_category: None,
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Checks that `category` is one of the configured feedback categories.
pub fn validate_category(category: &str, categories: &[String]) -> Result<()> {
    if categories.iter().any(|c| c == category) {
        return Ok(());
    }
    Err(Error::validation_code(
        ValidationErrorCode::InvalidFilter,
        format!(
            "Invalid category '{}'. Available options: {}",
            category,
            categories.join(", ")
        ),
    ))
}

impl PostFilter {
    /// Checks pagination bounds, the feedback category against `categories`
    /// and the keyword category against `categorizer`.
    pub fn validate_against(
        &self,
        categorizer: &KeywordCategorizer,
        categories: &[String],
    ) -> Result<()> {
        self.validate().map_err(|_| {
            Error::validation_code(
                ValidationErrorCode::InvalidPagination,
                format!(
                    "Invalid limit {}. Must be between 1 and {}",
                    self.limit, MAX_PAGE_LIMIT
                ),
            )
        })?;

        if let Some(category) = &self.category {
            validate_category(category, categories)?;
        }

        if let Some(label) = &self.keyword_category {
            if !categorizer.has_label(label) {
                return Err(Error::validation_code(
                    ValidationErrorCode::UnknownKeywordCategory,
                    format!(
                        "Invalid keyword_category '{}'. Available options: {}",
                        label,
                        categorizer.list_labels().join(", ")
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Whether `post` satisfies every set filter. Pagination is not applied here.
    pub fn matches(&self, post: &Post) -> bool {
        if !self.platforms.is_empty() && !self.platforms.contains(&post.platform) {
            return false;
        }
        if let Some(sentiment) = self.sentiment {
            if post.sentiment != Some(sentiment) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if post.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(source_type) = &self.source_type {
            if &post.source_type != source_type {
                return false;
            }
        }
        if let Some(source_name) = &self.source_name {
            if post.source_name.as_deref() != Some(source_name.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if post.status != status {
                return false;
            }
        }
        if let Some(label) = &self.keyword_category {
            if !post.categories.contains(label) {
                return false;
            }
        }
        true
    }
}
