//! Corpus store interface.

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::analysis::Enrichment;
use crate::error::Result;
use crate::filter::PostFilter;
use crate::post::{CategoryMerge, NewPost, Platform, Post, PostUpdate};
use crate::user_action::{ActionKey, ActionPage, NewUserAction, UserAction};

/// Persistence for harvested posts, keyed by `(platform, platform_id)`.
///
/// Implementations must make `merge_categories` and `apply_enrichment`
/// atomic per post: a concurrent reader sees the row either before or after
/// the write, never a mix.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Post>>;

    async fn get(&self, id: Uuid) -> Result<Option<Post>>;

    /// Lists posts matching `filter`, newest first, with offset/limit applied.
    async fn list(&self, filter: &PostFilter) -> Result<Vec<Post>>;

    /// Inserts a new post with `status = new`.
    ///
    /// Returns `Error::Conflict` when the `(platform, platform_id)` key exists.
    async fn create(&self, post: NewPost) -> Result<Post>;

    /// Unions `labels` into the stored categories. Writes only on change.
    async fn merge_categories(&self, id: Uuid, labels: &BTreeSet<String>)
        -> Result<CategoryMerge>;

    async fn update(&self, id: Uuid, update: PostUpdate) -> Result<Option<Post>>;

    /// Removes the post and every action recorded against it.
    async fn delete(&self, id: Uuid) -> Result<Option<Post>>;

    /// Posts with no enrichment yet, oldest first.
    async fn pending_enrichment(&self, limit: usize) -> Result<Vec<Post>>;

    /// Writes all enrichment fields in one step.
    ///
    /// Returns false if the post no longer exists or was already enriched.
    async fn apply_enrichment(&self, id: Uuid, enrichment: Enrichment) -> Result<bool>;

    async fn count(&self) -> Result<u64>;

    /// Records an action against an existing post.
    ///
    /// Recording an existing `(user_ref, post_id, action_type)` again replaces
    /// its metadata. Returns `Error::NotFound` when the post does not exist.
    async fn record_action(&self, action: NewUserAction) -> Result<UserAction>;

    /// Actions on `post_id`, newest first.
    async fn actions_for_post(&self, post_id: Uuid, page: ActionPage) -> Result<Vec<UserAction>>;

    /// Actions by `user_ref`, newest first.
    async fn actions_by_user(&self, user_ref: &str, page: ActionPage) -> Result<Vec<UserAction>>;

    async fn find_action(&self, key: &ActionKey) -> Result<Option<UserAction>>;

    async fn remove_action(&self, key: &ActionKey) -> Result<Option<UserAction>>;
}
