//! Corpus query and CRUD endpoints.

use std::str::FromStr;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use harvest_core::error::ValidationErrorCode;
use harvest_core::limits::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use harvest_core::{
    validate_category, Error, NewPost, Platform, Post, PostFilter, PostStatus, PostUpdate,
    Sentiment,
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::response::{ApiError, CategoriesResponse, PostListResponse};
use crate::state::AppState;

/// Raw query string for `GET /posts`.
///
/// Kept as strings so bad values produce coded validation errors rather
/// than extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Comma-separated platform names
    pub platforms: Option<String>,
    pub sentiment: Option<String>,
    pub category: Option<String>,
    pub source_type: Option<String>,
    pub source_name: Option<String>,
    pub status: Option<String>,
    pub keyword_category: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ListParams {
    pub fn into_filter(self) -> harvest_core::Result<PostFilter> {
        let platforms = match non_empty(self.platforms) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Platform::from_str)
                .collect::<harvest_core::Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let offset = match non_empty(self.offset) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::validation_code(
                    ValidationErrorCode::InvalidPagination,
                    format!("Invalid offset '{}'. Must be a non-negative integer", raw),
                )
            })?,
            None => 0,
        };

        let limit = match non_empty(self.limit) {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                Error::validation_code(
                    ValidationErrorCode::InvalidPagination,
                    format!(
                        "Invalid limit '{}'. Must be between 1 and {}",
                        raw, MAX_PAGE_LIMIT
                    ),
                )
            })?,
            None => DEFAULT_PAGE_LIMIT,
        };

        Ok(PostFilter {
            platforms,
            sentiment: non_empty(self.sentiment)
                .map(|s| Sentiment::from_str(&s))
                .transpose()?,
            category: non_empty(self.category),
            source_type: non_empty(self.source_type),
            source_name: non_empty(self.source_name),
            status: non_empty(self.status)
                .map(|s| PostStatus::from_str(&s))
                .transpose()?,
            keyword_category: non_empty(self.keyword_category),
            offset,
            limit,
        })
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        Error::validation_code(
            ValidationErrorCode::InvalidFilter,
            format!("Invalid post id '{}'", raw),
        )
        .into()
    })
}

/// GET /posts - List posts, newest first.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<PostListResponse>, ApiError> {
    let filter = params.into_filter()?;
    filter.validate_against(&state.categorizer, &state.feedback_categories)?;

    let posts = state.store.list(&filter).await?;
    debug!(count = posts.len(), offset = filter.offset, limit = filter.limit, "Listed posts");

    Ok(Json(PostListResponse {
        count: posts.len(),
        posts,
        offset: filter.offset,
        limit: filter.limit,
    }))
}

/// POST /posts - Create a post; keyword labels are added from its text.
pub async fn create_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewPost>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let Json(mut new) = payload?;
    new.validate()?;

    let labels = state.categorizer.categorize(&new.content_text);
    new.categories.extend(labels);

    let post = state.store.create(new).await?;
    info!(id = %post.id, platform = %post.platform, platform_id = %post.platform_id, "Post created via API");
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts/categories - Keyword labels and feedback categories.
pub async fn categories_handler(State(state): State<AppState>) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: state.categorizer.list_labels(),
        feedback_categories: state.feedback_categories.to_vec(),
    })
}

/// GET /posts/{id}
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let id = parse_id(&id)?;
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("post {}", id)).into())
}

/// PUT /posts/{id} - Partial update; categories are merged.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PostUpdate>, JsonRejection>,
) -> Result<Json<Post>, ApiError> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    update.validate()?;
    if let Some(category) = &update.category {
        validate_category(category, &state.feedback_categories)?;
    }

    let post = state
        .store
        .update(id, update)
        .await?
        .ok_or_else(|| ApiError::from(Error::not_found(format!("post {}", id))))?;
    info!(id = %post.id, "Post updated");
    Ok(Json(post))
}

/// DELETE /posts/{id} - Returns the deleted post.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let id = parse_id(&id)?;
    let post = state
        .store
        .delete(id)
        .await?
        .ok_or_else(|| ApiError::from(Error::not_found(format!("post {}", id))))?;
    info!(id = %post.id, "Post deleted");
    Ok(Json(post))
}
