//! `user_actions` rows and queries.
//!
//! Same write scheme as posts: whole-row inserts, newest `updated_at` wins,
//! removals insert a tombstone. The [`CorpusStore`](harvest_core::CorpusStore)
//! methods that use these helpers hold the parent post's lock stripe, so a
//! post delete and an action write never interleave.

use std::str::FromStr;
use std::time::Instant;

use chrono::Utc;
use clickhouse::Row;
use harvest_core::{ActionKey, ActionPage, ActionType, Result, UserAction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::posts::{
    corrupt, from_json, from_millis, query_err, to_json, write_err, ClickHouseStore,
};

/// One row of the `user_actions` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct UserActionRow {
    pub id: String,
    pub user_ref: String,
    pub post_id: String,
    pub action_type: String,
    pub metadata: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_deleted: u8,
}

impl UserActionRow {
    pub fn from_action(action: &UserAction) -> Result<Self> {
        Ok(Self {
            id: action.id.to_string(),
            user_ref: action.user_ref.clone(),
            post_id: action.post_id.to_string(),
            action_type: action.action_type.as_str().to_string(),
            metadata: to_json(&action.metadata)?,
            created_at: action.created_at.timestamp_millis(),
            updated_at: action.updated_at.timestamp_millis(),
            is_deleted: 0,
        })
    }

    pub fn into_action(self) -> Result<UserAction> {
        Ok(UserAction {
            id: Uuid::parse_str(&self.id).map_err(|e| corrupt("id", e))?,
            user_ref: self.user_ref,
            post_id: Uuid::parse_str(&self.post_id).map_err(|e| corrupt("post_id", e))?,
            action_type: ActionType::from_str(&self.action_type)
                .map_err(|e| corrupt("action_type", e))?,
            metadata: from_json("metadata", &self.metadata)?,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }

    /// Tombstone that supersedes this row.
    fn tombstone(mut self) -> Self {
        self.is_deleted = 1;
        self.updated_at = Utc::now().timestamp_millis().max(self.updated_at + 1);
        self
    }
}

const FIND_ACTION_SQL: &str = "SELECT ?fields FROM user_actions FINAL \
    WHERE user_ref = ? AND post_id = ? AND action_type = ? AND is_deleted = 0 LIMIT 1";

pub(crate) const ACTIONS_FOR_POST_SQL: &str = "SELECT ?fields FROM user_actions FINAL \
    WHERE post_id = ? AND is_deleted = 0 \
    ORDER BY created_at DESC LIMIT ? OFFSET ?";

pub(crate) const ACTIONS_BY_USER_SQL: &str = "SELECT ?fields FROM user_actions FINAL \
    WHERE user_ref = ? AND is_deleted = 0 \
    ORDER BY created_at DESC LIMIT ? OFFSET ?";

const LIVE_ACTIONS_FOR_POST_SQL: &str =
    "SELECT ?fields FROM user_actions FINAL WHERE post_id = ? AND is_deleted = 0";

impl ClickHouseStore {
    pub(crate) async fn insert_action_rows(&self, rows: &[UserActionRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let mut insert = self
            .client()
            .inner()
            .insert("user_actions")
            .map_err(write_err)?;
        for row in rows {
            insert.write(row).await.map_err(write_err)?;
        }
        insert.end().await.map_err(write_err)?;
        telemetry::metrics()
            .store_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        Ok(())
    }

    pub(crate) async fn fetch_action(&self, key: &ActionKey) -> Result<Option<UserActionRow>> {
        self.client()
            .inner()
            .query(FIND_ACTION_SQL)
            .bind(key.user_ref.as_str())
            .bind(key.post_id.to_string())
            .bind(key.action_type.as_str())
            .fetch_optional::<UserActionRow>()
            .await
            .map_err(query_err)
    }

    /// Runs one of the paged listing queries with its single filter value.
    pub(crate) async fn list_actions(
        &self,
        sql: &str,
        value: &str,
        page: ActionPage,
    ) -> Result<Vec<UserAction>> {
        let rows = self
            .client()
            .inner()
            .query(sql)
            .bind(value)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all::<UserActionRow>()
            .await
            .map_err(query_err)?;
        rows.into_iter().map(UserActionRow::into_action).collect()
    }

    /// Writes a tombstone for `row`.
    pub(crate) async fn tombstone_action(&self, row: UserActionRow) -> Result<()> {
        self.insert_action_rows(&[row.tombstone()]).await
    }

    /// Tombstones every live action on `post_id`. Returns how many.
    pub(crate) async fn tombstone_actions_for_post(&self, post_id: Uuid) -> Result<usize> {
        let rows = self
            .client()
            .inner()
            .query(LIVE_ACTIONS_FOR_POST_SQL)
            .bind(post_id.to_string())
            .fetch_all::<UserActionRow>()
            .await
            .map_err(query_err)?;
        let tombstones: Vec<UserActionRow> =
            rows.into_iter().map(UserActionRow::tombstone).collect();
        self.insert_action_rows(&tombstones).await?;
        Ok(tombstones.len())
    }
}
