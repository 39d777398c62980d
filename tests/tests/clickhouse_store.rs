//! ClickHouse-backed corpus store.
//!
//! Requires Docker (or `HARVESTER_TEST_CLICKHOUSE_URL`); run with
//! `cargo test -p integration-tests --test clickhouse_store -- --ignored`.

use std::collections::BTreeSet;

use clickhouse_store::{count_snapshots, insert_metrics};
use harvest_core::{
    ActionPage, ActionType, CategoryMerge, CorpusStore, Enrichment, NewUserAction, Platform,
    PostFilter, PostUpdate, Sentiment,
};
use integration_tests::fixtures::{self, labels};
use integration_tests::setup::ClickHouseContext;
use uuid::Uuid;

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_find_and_conflict() {
    let ctx = ClickHouseContext::new().await;
    assert!(ctx.client.ping().await);

    let id = unique("abc");
    let mut new = fixtures::new_post(fixtures::reddit_candidate(&id, "Cursor IDE is great"));
    new.categories = labels(&["cursor"]);

    let created = ctx.store.create(new.clone()).await.unwrap();
    let found = ctx
        .store
        .find_by_platform_id(Platform::Reddit, &id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.categories, labels(&["cursor"]));
    assert_eq!(found.additional_data["subreddit"], "vscode");

    let err = ctx.store.create(new).await.unwrap_err();
    assert_eq!(err.error_code(), Some("CONFLICT"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_merge_categories_only_adds() {
    let ctx = ClickHouseContext::new().await;
    let mut new = fixtures::new_post(fixtures::reddit_candidate(&unique("m"), "cursor"));
    new.categories = labels(&["cursor"]);
    let post = ctx.store.create(new).await.unwrap();

    let merge = ctx
        .store
        .merge_categories(post.id, &labels(&["cursor", "general"]))
        .await
        .unwrap();
    assert_eq!(
        merge,
        CategoryMerge::Updated {
            added: labels(&["general"])
        }
    );

    let merge = ctx
        .store
        .merge_categories(post.id, &labels(&["general"]))
        .await
        .unwrap();
    assert_eq!(merge, CategoryMerge::Unchanged);

    let stored = ctx.store.get(post.id).await.unwrap().unwrap();
    assert_eq!(stored.categories, labels(&["cursor", "general"]));
    assert_eq!(stored.content_text, "cursor");

    let missing = ctx
        .store
        .merge_categories(Uuid::new_v4(), &BTreeSet::new())
        .await
        .unwrap_err();
    assert_eq!(missing.error_code(), Some("NOT_FOUND"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_enrichment_is_written_once_and_leaves_pending() {
    let ctx = ClickHouseContext::new().await;
    let post = ctx
        .store
        .create(fixtures::new_post(fixtures::reddit_candidate(
            &unique("e"),
            "cursor lost my settings",
        )))
        .await
        .unwrap();

    let pending = ctx.store.pending_enrichment(1000).await.unwrap();
    assert!(pending.iter().any(|p| p.id == post.id));

    let mut sentiment = fixtures::sentiment(Sentiment::Positive, 0.4, &["Cursor"]);
    sentiment.gate(0.7);
    let enrichment = Enrichment::combine(
        fixtures::products(&["Cursor"], 0.9),
        sentiment,
        fixtures::categorization("bug_report", 0.8),
    );

    assert!(ctx
        .store
        .apply_enrichment(post.id, enrichment.clone())
        .await
        .unwrap());
    assert!(!ctx.store.apply_enrichment(post.id, enrichment).await.unwrap());

    let stored = ctx.store.get(post.id).await.unwrap().unwrap();
    assert_eq!(stored.sentiment, Some(Sentiment::Neutral));
    assert_eq!(stored.category.as_deref(), Some("bug_report"));
    let enrichment = stored.enrichment.unwrap();
    assert_eq!(enrichment.confidence, 0.4);
    assert!(enrichment.sentiment.suppressed);

    let pending = ctx.store.pending_enrichment(1000).await.unwrap();
    assert!(pending.iter().all(|p| p.id != post.id));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pending_puts_whitespace_only_posts_last() {
    let ctx = ClickHouseContext::new().await;
    let blank = ctx
        .store
        .create(fixtures::new_post(fixtures::reddit_candidate(
            &unique("blank"),
            "\t\n \r\n",
        )))
        .await
        .unwrap();
    let worded = ctx
        .store
        .create(fixtures::new_post(fixtures::reddit_candidate(
            &unique("worded"),
            "windsurf keeps crashing",
        )))
        .await
        .unwrap();

    let pending = ctx.store.pending_enrichment(10_000).await.unwrap();
    let position = |id| pending.iter().position(|p| p.id == id).unwrap();
    assert!(position(worded.id) < position(blank.id));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_list_and_delete() {
    let ctx = ClickHouseContext::new().await;
    let keyword = unique("kw");
    let post = ctx
        .store
        .create(fixtures::new_post(fixtures::tweet_candidate(
            &unique("t"),
            "windsurf",
            &keyword,
        )))
        .await
        .unwrap();

    let updated = ctx
        .store
        .update(
            post.id,
            PostUpdate {
                urgency: Some(5),
                categories: Some(labels(&["windsurf"])),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.urgency, 5);

    let filter = PostFilter {
        platforms: vec![Platform::Twitter],
        source_name: Some(keyword.clone()),
        keyword_category: Some("windsurf".to_string()),
        ..Default::default()
    };
    let listed = ctx.store.list(&filter).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].urgency, 5);

    let deleted = ctx.store.delete(post.id).await.unwrap().unwrap();
    assert_eq!(deleted.id, post.id);
    assert!(ctx.store.get(post.id).await.unwrap().is_none());
    assert!(ctx.store.list(&filter).await.unwrap().is_empty());
    assert!(ctx.store.delete(post.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_metrics_snapshot_is_persisted() {
    let ctx = ClickHouseContext::new().await;
    let before = count_snapshots(&ctx.client).await.unwrap();

    insert_metrics(&ctx.client, telemetry::metrics().snapshot())
        .await
        .unwrap();

    assert_eq!(count_snapshots(&ctx.client).await.unwrap(), before + 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_user_actions_replace_remove_and_cascade() {
    let ctx = ClickHouseContext::new().await;
    let post = ctx
        .store
        .create(fixtures::new_post(fixtures::reddit_candidate(&unique("ua"), "cursor")))
        .await
        .unwrap();
    let user = unique("user");
    let action = |action_type, metadata| NewUserAction {
        user_ref: user.clone(),
        post_id: post.id,
        action_type,
        metadata,
    };

    let first = ctx
        .store
        .record_action(action(ActionType::Like, serde_json::json!({"n": 1})))
        .await
        .unwrap();
    let again = ctx
        .store
        .record_action(action(ActionType::Like, serde_json::json!({"n": 2})))
        .await
        .unwrap();
    assert_eq!(again.id, first.id);
    ctx.store
        .record_action(action(ActionType::Save, serde_json::Value::Null))
        .await
        .unwrap();

    let listed = ctx
        .store
        .actions_by_user(&user, ActionPage::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    let like = ctx.store.find_action(&first.key()).await.unwrap().unwrap();
    assert_eq!(like.metadata["n"], 2);

    let removed = ctx.store.remove_action(&first.key()).await.unwrap();
    assert_eq!(removed.unwrap().id, first.id);
    assert!(ctx.store.find_action(&first.key()).await.unwrap().is_none());

    let missing = ctx
        .store
        .record_action(NewUserAction {
            post_id: Uuid::new_v4(),
            ..action(ActionType::View, serde_json::Value::Null)
        })
        .await
        .unwrap_err();
    assert_eq!(missing.error_code(), Some("NOT_FOUND"));

    ctx.store.delete(post.id).await.unwrap();
    let on_post = ctx
        .store
        .actions_for_post(post.id, ActionPage::default())
        .await
        .unwrap();
    assert!(on_post.is_empty());
}
