//! ClickHouse-backed [`CorpusStore`].
//!
//! Every write inserts one complete row; ReplacingMergeTree keeps the row
//! with the newest `updated_at` per `(platform, platform_id)`, and reads use
//! `FINAL`. A single-row insert is atomic, so readers never see a partial
//! enrichment. Read-modify-write operations take a per-key lock stripe so
//! two writers in this process cannot interleave on the same post.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use clickhouse::Row;
use harvest_core::error::DbErrorCode;
use harvest_core::{
    ActionKey, ActionPage, CategoryMerge, CorpusStore, Enrichment, Error, NewPost,
    NewUserAction, Platform, Post, PostFilter, PostStatus, PostUpdate, Result, Sentiment,
    UserAction,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::actions::{UserActionRow, ACTIONS_BY_USER_SQL, ACTIONS_FOR_POST_SQL};
use crate::client::ClickHouseClient;

/// One row of the `posts` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct PostRow {
    pub id: String,
    pub platform: String,
    pub platform_id: String,
    pub platform_url: Option<String>,
    pub author_username: Option<String>,
    pub author_platform_id: Option<String>,
    pub author_avatar_url: Option<String>,
    pub content_text: String,
    pub source_type: String,
    pub source_name: Option<String>,
    pub categories: Vec<String>,
    pub status: String,
    pub sentiment: Option<String>,
    pub category: Option<String>,
    pub urgency: i32,
    pub extra_data: String,
    pub additional_data: String,
    pub openai_products: Option<String>,
    pub openai_sentiment: Option<String>,
    pub openai_categories: Option<String>,
    pub openai_confidence: Option<f64>,
    pub openai_analysis_timestamp: Option<i64>, // milliseconds since epoch
    pub created_at: i64,
    pub updated_at: i64,
    pub is_deleted: u8,
}

pub(crate) fn query_err(e: clickhouse::error::Error) -> Error {
    Error::database(DbErrorCode::QueryFailed, format!("Query error: {}", e))
}

pub(crate) fn write_err(e: clickhouse::error::Error) -> Error {
    Error::database(DbErrorCode::WriteFailed, format!("Write error: {}", e))
}

pub(crate) fn corrupt(field: &str, detail: impl std::fmt::Display) -> Error {
    Error::database(
        DbErrorCode::QueryFailed,
        format!("Corrupt {} in stored row: {}", field, detail),
    )
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| corrupt("timestamp", ms))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(field: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| corrupt(field, e))
}

impl PostRow {
    pub fn from_post(post: &Post) -> Result<Self> {
        let enrichment = post.enrichment.as_ref();
        Ok(Self {
            id: post.id.to_string(),
            platform: post.platform.as_str().to_string(),
            platform_id: post.platform_id.clone(),
            platform_url: post.platform_url.clone(),
            author_username: post.author_username.clone(),
            author_platform_id: post.author_platform_id.clone(),
            author_avatar_url: post.author_avatar_url.clone(),
            content_text: post.content_text.clone(),
            source_type: post.source_type.clone(),
            source_name: post.source_name.clone(),
            categories: post.categories.iter().cloned().collect(),
            status: post.status.as_str().to_string(),
            sentiment: post.sentiment.map(|s| s.as_str().to_string()),
            category: post.category.clone(),
            urgency: post.urgency,
            extra_data: to_json(&post.extra_data)?,
            additional_data: to_json(&post.additional_data)?,
            openai_products: enrichment.map(|e| to_json(&e.products)).transpose()?,
            openai_sentiment: enrichment.map(|e| to_json(&e.sentiment)).transpose()?,
            openai_categories: enrichment.map(|e| to_json(&e.categories)).transpose()?,
            openai_confidence: enrichment.map(|e| e.confidence),
            openai_analysis_timestamp: enrichment.map(|e| e.analyzed_at.timestamp_millis()),
            created_at: post.created_at.timestamp_millis(),
            updated_at: post.updated_at.timestamp_millis(),
            is_deleted: 0,
        })
    }

    pub fn into_post(self) -> Result<Post> {
        let enrichment = match (
            self.openai_products,
            self.openai_sentiment,
            self.openai_categories,
            self.openai_confidence,
            self.openai_analysis_timestamp,
        ) {
            (Some(products), Some(sentiment), Some(categories), Some(confidence), Some(ts)) => {
                Some(Enrichment {
                    products: from_json("openai_products", &products)?,
                    sentiment: from_json("openai_sentiment", &sentiment)?,
                    categories: from_json("openai_categories", &categories)?,
                    confidence,
                    analyzed_at: from_millis(ts)?,
                })
            }
            (None, None, None, None, None) => None,
            _ => return Err(corrupt("enrichment", "partially populated")),
        };

        Ok(Post {
            id: Uuid::parse_str(&self.id).map_err(|e| corrupt("id", e))?,
            platform: Platform::from_str(&self.platform).map_err(|e| corrupt("platform", e))?,
            platform_id: self.platform_id,
            platform_url: self.platform_url,
            author_username: self.author_username,
            author_platform_id: self.author_platform_id,
            author_avatar_url: self.author_avatar_url,
            content_text: self.content_text,
            source_type: self.source_type,
            source_name: self.source_name,
            categories: self.categories.into_iter().collect(),
            status: PostStatus::from_str(&self.status).map_err(|e| corrupt("status", e))?,
            sentiment: self
                .sentiment
                .as_deref()
                .map(Sentiment::from_str)
                .transpose()
                .map_err(|e| corrupt("sentiment", e))?,
            category: self.category,
            urgency: self.urgency,
            extra_data: from_json("extra_data", &self.extra_data)?,
            additional_data: from_json("additional_data", &self.additional_data)?,
            enrichment,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

/// A bound value for a dynamically built WHERE clause.
enum Bind {
    Str(String),
    List(Vec<String>),
}

/// Builds the WHERE clause for a listing.
fn filter_clause(filter: &PostFilter) -> (String, Vec<Bind>) {
    let mut clauses = vec!["is_deleted = 0".to_string()];
    let mut binds = Vec::new();

    if !filter.platforms.is_empty() {
        clauses.push("platform IN ?".to_string());
        binds.push(Bind::List(
            filter
                .platforms
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
        ));
    }
    if let Some(sentiment) = filter.sentiment {
        clauses.push("sentiment = ?".to_string());
        binds.push(Bind::Str(sentiment.as_str().to_string()));
    }
    if let Some(category) = &filter.category {
        clauses.push("category = ?".to_string());
        binds.push(Bind::Str(category.clone()));
    }
    if let Some(source_type) = &filter.source_type {
        clauses.push("source_type = ?".to_string());
        binds.push(Bind::Str(source_type.clone()));
    }
    if let Some(source_name) = &filter.source_name {
        clauses.push("source_name = ?".to_string());
        binds.push(Bind::Str(source_name.clone()));
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?".to_string());
        binds.push(Bind::Str(status.as_str().to_string()));
    }
    if let Some(label) = &filter.keyword_category {
        clauses.push("has(categories, ?)".to_string());
        binds.push(Bind::Str(label.clone()));
    }

    (clauses.join(" AND "), binds)
}

/// Unenriched posts, ones with text first. `trim` only strips spaces, so
/// blank-ness is matched against every whitespace character.
const PENDING_SQL: &str = "SELECT ?fields FROM posts FINAL \
    WHERE openai_analysis_timestamp IS NULL AND is_deleted = 0 \
    ORDER BY match(content_text, '^\\\\s*$') ASC, created_at ASC LIMIT ?";

/// ClickHouse corpus store.
pub struct ClickHouseStore {
    client: ClickHouseClient,
    stripes: Vec<Mutex<()>>,
}

impl ClickHouseStore {
    pub fn new(client: ClickHouseClient) -> Self {
        let count = client.config().lock_stripes.max(1);
        Self {
            client,
            stripes: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    pub(crate) fn stripe(&self, platform: Platform, platform_id: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        platform.hash(&mut hasher);
        platform_id.hash(&mut hasher);
        let idx = (hasher.finish() % self.stripes.len() as u64) as usize;
        &self.stripes[idx]
    }

    async fn insert_row(&self, row: &PostRow) -> Result<()> {
        let started = Instant::now();
        let mut insert = self.client.inner().insert("posts").map_err(write_err)?;
        insert.write(row).await.map_err(write_err)?;
        insert.end().await.map_err(write_err)?;
        telemetry::metrics()
            .store_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        Ok(())
    }

    async fn write_post(&self, post: &Post) -> Result<()> {
        self.insert_row(&PostRow::from_post(post)?).await
    }

    async fn fetch_optional(&self, sql: &str, bind: &str) -> Result<Option<Post>> {
        let started = Instant::now();
        let row = self
            .client
            .inner()
            .query(sql)
            .bind(bind)
            .fetch_optional::<PostRow>()
            .await
            .map_err(query_err)?;
        telemetry::metrics()
            .store_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        row.map(PostRow::into_post).transpose()
    }

    /// Runs `f` on the current version of post `id` under its key lock.
    ///
    /// `f` returns whether the post changed; only then is a new row written.
    async fn modify<T, F>(&self, id: Uuid, f: F) -> Result<Option<(Post, T)>>
    where
        F: FnOnce(&mut Post) -> (bool, T),
    {
        let Some(current) = self.get(id).await? else {
            return Ok(None);
        };
        let _guard = self
            .stripe(current.platform, &current.platform_id)
            .lock()
            .await;

        // Re-read under the lock; another writer may have got there first
        let Some(mut post) = self.get(id).await? else {
            return Ok(None);
        };
        let (changed, out) = f(&mut post);
        if changed {
            self.write_post(&post).await?;
        }
        Ok(Some((post, out)))
    }
}

#[async_trait]
impl CorpusStore for ClickHouseStore {
    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Post>> {
        let started = Instant::now();
        let row = self
            .client
            .inner()
            .query(
                "SELECT ?fields FROM posts FINAL \
                 WHERE platform = ? AND platform_id = ? AND is_deleted = 0 LIMIT 1",
            )
            .bind(platform.as_str())
            .bind(platform_id)
            .fetch_optional::<PostRow>()
            .await
            .map_err(query_err)?;
        telemetry::metrics()
            .store_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        row.map(PostRow::into_post).transpose()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Post>> {
        self.fetch_optional(
            "SELECT ?fields FROM posts FINAL WHERE id = ? AND is_deleted = 0 LIMIT 1",
            &id.to_string(),
        )
        .await
    }

    async fn list(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let (clause, binds) = filter_clause(filter);
        let sql = format!(
            "SELECT ?fields FROM posts FINAL WHERE {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            clause
        );

        let mut query = self.client.inner().query(&sql);
        for bind in binds {
            query = match bind {
                Bind::Str(value) => query.bind(value),
                Bind::List(values) => query.bind(values),
            };
        }
        let rows = query
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all::<PostRow>()
            .await
            .map_err(query_err)?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    async fn create(&self, new: NewPost) -> Result<Post> {
        let _guard = self.stripe(new.platform, &new.platform_id).lock().await;

        if self
            .find_by_platform_id(new.platform, &new.platform_id)
            .await?
            .is_some()
        {
            return Err(Error::conflict(new.platform.as_str(), new.platform_id));
        }

        let post = Post::from_new(new);
        self.write_post(&post).await?;
        debug!(id = %post.id, platform = %post.platform, platform_id = %post.platform_id, "Created post");
        Ok(post)
    }

    async fn merge_categories(
        &self,
        id: Uuid,
        labels: &BTreeSet<String>,
    ) -> Result<CategoryMerge> {
        let outcome = self
            .modify(id, |post| {
                let merge = post.merge_categories(labels);
                (merge != CategoryMerge::Unchanged, merge)
            })
            .await?;

        match outcome {
            Some((_, merge)) => Ok(merge),
            None => Err(Error::not_found(format!("post {}", id))),
        }
    }

    async fn update(&self, id: Uuid, update: PostUpdate) -> Result<Option<Post>> {
        let outcome = self
            .modify(id, |post| {
                post.apply_update(update);
                (true, ())
            })
            .await?;
        Ok(outcome.map(|(post, _)| post))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Post>> {
        let Some(current) = self.get(id).await? else {
            return Ok(None);
        };
        let _guard = self
            .stripe(current.platform, &current.platform_id)
            .lock()
            .await;

        // Actions first: a failure here leaves the post visible for a retry
        let removed = self.tombstone_actions_for_post(id).await?;
        if removed > 0 {
            debug!(id = %id, actions = removed, "Removed actions of deleted post");
        }

        let mut tombstone = PostRow::from_post(&current)?;
        tombstone.is_deleted = 1;
        tombstone.updated_at = Utc::now()
            .timestamp_millis()
            .max(current.updated_at.timestamp_millis() + 1);
        self.insert_row(&tombstone).await?;
        Ok(Some(current))
    }

    async fn pending_enrichment(&self, limit: usize) -> Result<Vec<Post>> {
        let rows = self
            .client
            .inner()
            .query(PENDING_SQL)
            .bind(limit as u64)
            .fetch_all::<PostRow>()
            .await
            .map_err(query_err)?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    async fn apply_enrichment(&self, id: Uuid, enrichment: Enrichment) -> Result<bool> {
        let outcome = self
            .modify(id, |post| {
                if post.is_enriched() {
                    return (false, false);
                }
                post.apply_enrichment(enrichment);
                (true, true)
            })
            .await?;
        Ok(matches!(outcome, Some((_, true))))
    }

    async fn count(&self) -> Result<u64> {
        self.client
            .inner()
            .query("SELECT count() FROM posts FINAL WHERE is_deleted = 0")
            .fetch_one()
            .await
            .map_err(query_err)
    }

    async fn record_action(&self, new: NewUserAction) -> Result<UserAction> {
        let missing = || Error::not_found(format!("post {}", new.post_id));
        let post = self.get(new.post_id).await?.ok_or_else(missing)?;
        let _guard = self.stripe(post.platform, &post.platform_id).lock().await;

        // Re-check under the lock; a delete may have won
        if self.get(new.post_id).await?.is_none() {
            return Err(missing());
        }
        let existing = self
            .fetch_action(&new.key())
            .await?
            .map(UserActionRow::into_action)
            .transpose()?;
        let action = UserAction::record(existing, new);
        self.insert_action_rows(&[UserActionRow::from_action(&action)?])
            .await?;
        debug!(id = %action.id, post_id = %action.post_id, action = %action.action_type, "Recorded action");
        Ok(action)
    }

    async fn actions_for_post(&self, post_id: Uuid, page: ActionPage) -> Result<Vec<UserAction>> {
        self.list_actions(ACTIONS_FOR_POST_SQL, &post_id.to_string(), page)
            .await
    }

    async fn actions_by_user(&self, user_ref: &str, page: ActionPage) -> Result<Vec<UserAction>> {
        self.list_actions(ACTIONS_BY_USER_SQL, user_ref, page).await
    }

    async fn find_action(&self, key: &ActionKey) -> Result<Option<UserAction>> {
        self.fetch_action(key)
            .await?
            .map(UserActionRow::into_action)
            .transpose()
    }

    async fn remove_action(&self, key: &ActionKey) -> Result<Option<UserAction>> {
        // Deleting a post removes its actions first, so no post means no action
        let Some(post) = self.get(key.post_id).await? else {
            return Ok(None);
        };
        let _guard = self.stripe(post.platform, &post.platform_id).lock().await;

        let Some(row) = self.fetch_action(key).await? else {
            return Ok(None);
        };
        let action = row.clone().into_action()?;
        self.tombstone_action(row).await?;
        Ok(Some(action))
    }
}
