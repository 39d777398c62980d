//! HTTP surface tests over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use api::response::{CategoriesResponse, ErrorResponse, HealthResponse, PostListResponse};
use async_trait::async_trait;
use axum::http::StatusCode;
use harvest_core::{Platform, Post, PostStatus, Sentiment};
use integration_tests::fixtures::{self, labels};
use integration_tests::setup::TestContext;
use serde_json::json;
use telemetry::{health, HealthStatus};
use tokio::sync::Notify;
use uuid::Uuid;
use worker::{Job, Scheduler};

fn create_body(platform_id: &str, text: &str) -> serde_json::Value {
    json!({
        "platform": "reddit",
        "platform_id": platform_id,
        "platform_url": format!("https://reddit.com/r/vscode/comments/{}/", platform_id),
        "author_username": "api_user",
        "content_text": text,
        "source_name": "vscode",
    })
}

fn seed(ctx: &TestContext, candidate: harvest_core::CandidatePost) -> Post {
    let post = Post::from_new(fixtures::new_post(candidate));
    ctx.store.insert(post.clone());
    post
}

#[tokio::test]
async fn test_create_get_update_delete_round_trip() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let created = server
        .post("/posts")
        .json(&create_body("crud1", "Switched from copilot to cursor"))
        .await;
    created.assert_status(StatusCode::CREATED);
    let post: Post = created.json();
    assert_eq!(post.platform, Platform::Reddit);
    assert_eq!(post.status, PostStatus::New);
    assert_eq!(post.source_type, "reddit");
    assert_eq!(post.categories, labels(&["cursor", "general"]));

    let fetched: Post = server.get(&format!("/posts/{}", post.id)).await.json();
    assert_eq!(fetched.id, post.id);
    assert_eq!(fetched.content_text, "Switched from copilot to cursor");

    let updated = server
        .put(&format!("/posts/{}", post.id))
        .json(&json!({
            "status": "viewed",
            "sentiment": "positive",
            "urgency": 3,
            "categories": ["triaged"],
        }))
        .await;
    updated.assert_status_ok();
    let updated: Post = updated.json();
    assert_eq!(updated.status, PostStatus::Viewed);
    assert_eq!(updated.sentiment, Some(Sentiment::Positive));
    assert_eq!(updated.urgency, 3);
    assert_eq!(updated.categories, labels(&["cursor", "general", "triaged"]));

    let deleted = server.delete(&format!("/posts/{}", post.id)).await;
    deleted.assert_status_ok();
    assert_eq!(deleted.json::<Post>().id, post.id);

    let missing = server.get(&format!("/posts/{}", post.id)).await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<ErrorResponse>().code, "NOT_FOUND");
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_create_keeps_supplied_categories() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut body = create_body("cat1", "lovable looks promising");
    body["categories"] = json!(["manual"]);
    let post: Post = server.post("/posts").json(&body).await.json();

    assert_eq!(post.categories, labels(&["lovable", "manual"]));
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/posts")
        .json(&create_body("dup", "cursor"))
        .await
        .assert_status(StatusCode::CREATED);

    let again = server.post("/posts").json(&create_body("dup", "cursor")).await;
    again.assert_status(StatusCode::CONFLICT);
    assert_eq!(again.json::<ErrorResponse>().code, "CONFLICT");
    assert_eq!(ctx.store.len(), 1);
}

#[tokio::test]
async fn test_invalid_payloads_are_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    // Empty platform id
    let resp = server.post("/posts").json(&create_body("", "text")).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let err: ErrorResponse = resp.json();
    assert_eq!(err.code, "VALID_004");
    assert!(err.details.unwrap()[0].starts_with("platform_id"));

    // Unknown platform fails to deserialize
    let mut body = create_body("x1", "text");
    body["platform"] = json!("mastodon");
    let resp = server.post("/posts").json(&body).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<ErrorResponse>().code, "VALID_004");

    // Urgency out of range on update
    let post = seed(&ctx, fixtures::reddit_candidate("u1", "cursor"));
    let resp = server
        .put(&format!("/posts/{}", post.id))
        .json(&json!({ "urgency": 99 }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<ErrorResponse>().code, "VALID_004");
    assert_eq!(ctx.store.all()[0].urgency, 0);
}

#[tokio::test]
async fn test_bad_post_id_is_a_filter_error() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let resp = server.get("/posts/not-a-uuid").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<ErrorResponse>().code, "VALID_001");

    let resp = server.delete(&format!("/posts/{}", Uuid::new_v4())).await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters() {
    let ctx = TestContext::new();
    let server = ctx.server();

    seed(&ctx, fixtures::reddit_candidate("r1", "cursor is great"));
    seed(&ctx, fixtures::reddit_candidate("r2", "windsurf is great"));
    let mut tweet = Post::from_new(fixtures::new_post(fixtures::tweet_candidate(
        "t1",
        "cursor ai on twitter",
        "cursor ai",
    )));
    tweet.categories = labels(&["cursor"]);
    tweet.sentiment = Some(Sentiment::Negative);
    ctx.store.insert(tweet);

    let all: PostListResponse = server.get("/posts").await.json();
    assert_eq!(all.count, 3);
    assert_eq!(all.limit, 100);
    assert_eq!(all.offset, 0);

    let reddit: PostListResponse = server
        .get("/posts")
        .add_query_param("platforms", "reddit")
        .await
        .json();
    assert_eq!(reddit.count, 2);
    assert!(reddit.posts.iter().all(|p| p.platform == Platform::Reddit));

    let both: PostListResponse = server
        .get("/posts")
        .add_query_param("platforms", "reddit,twitter")
        .await
        .json();
    assert_eq!(both.count, 3);

    let negative: PostListResponse = server
        .get("/posts")
        .add_query_param("sentiment", "negative")
        .await
        .json();
    assert_eq!(negative.count, 1);
    assert_eq!(negative.posts[0].platform_id, "t1");

    let source: PostListResponse = server
        .get("/posts")
        .add_query_param("source_name", "cursor ai")
        .await
        .json();
    assert_eq!(source.count, 1);

    let paged: PostListResponse = server
        .get("/posts")
        .add_query_param("offset", "1")
        .add_query_param("limit", "1")
        .await
        .json();
    assert_eq!(paged.count, 1);
    assert_eq!(paged.offset, 1);
    assert_eq!(paged.limit, 1);
}

#[tokio::test]
async fn test_keyword_category_filter() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut tagged = Post::from_new(fixtures::new_post(fixtures::reddit_candidate(
        "k1",
        "windsurf and codeium",
    )));
    tagged.categories = labels(&["windsurf"]);
    ctx.store.insert(tagged);
    seed(&ctx, fixtures::reddit_candidate("k2", "unrelated"));

    let windsurf: PostListResponse = server
        .get("/posts")
        .add_query_param("keyword_category", "windsurf")
        .await
        .json();
    assert_eq!(windsurf.count, 1);
    assert_eq!(windsurf.posts[0].platform_id, "k1");

    let resp = server
        .get("/posts")
        .add_query_param("keyword_category", "vim")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let err: ErrorResponse = resp.json();
    assert_eq!(err.code, "VALID_002");
    assert!(err.error.contains("cursor, general, lovable, windsurf"), "{}", err.error);
}

#[tokio::test]
async fn test_category_must_be_a_feedback_category() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut praised = Post::from_new(fixtures::new_post(fixtures::reddit_candidate(
        "c1",
        "cursor is lovely",
    )));
    praised.category = Some("Praise".to_string());
    ctx.store.insert(praised);
    let plain = seed(&ctx, fixtures::reddit_candidate("c2", "cursor crashed"));

    let found: PostListResponse = server
        .get("/posts")
        .add_query_param("category", "Praise")
        .await
        .json();
    assert_eq!(found.count, 1);
    assert_eq!(found.posts[0].platform_id, "c1");

    let resp = server
        .get("/posts")
        .add_query_param("category", "rants")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let err: ErrorResponse = resp.json();
    assert_eq!(err.code, "VALID_001");
    assert!(err.error.contains("'rants'"), "{}", err.error);
    assert!(
        err.error.contains("Bug Reports, Feature Requests, General Feedback"),
        "{}",
        err.error
    );

    let resp = server
        .put(&format!("/posts/{}", plain.id))
        .json(&json!({ "category": "rants" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<ErrorResponse>().code, "VALID_001");
    assert_eq!(ctx.store.by_key(Platform::Reddit, "c2").unwrap().category, None);

    let updated: Post = server
        .put(&format!("/posts/{}", plain.id))
        .json(&json!({ "category": "Bug Reports" }))
        .await
        .json();
    assert_eq!(updated.category.as_deref(), Some("Bug Reports"));
}

#[tokio::test]
async fn test_invalid_list_parameters() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let resp = server
        .get("/posts")
        .add_query_param("platforms", "reddit,mastodon")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let err: ErrorResponse = resp.json();
    assert_eq!(err.code, "VALID_001");
    assert!(err.error.contains("reddit, twitter"));

    let resp = server
        .get("/posts")
        .add_query_param("sentiment", "angry")
        .await;
    assert_eq!(resp.json::<ErrorResponse>().code, "VALID_001");

    for (key, value) in [("limit", "0"), ("limit", "5000"), ("limit", "ten"), ("offset", "-1")] {
        let resp = server.get("/posts").add_query_param(key, value).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(resp.json::<ErrorResponse>().code, "VALID_003", "{}={}", key, value);
    }
}

#[tokio::test]
async fn test_categories_endpoint() {
    let ctx = TestContext::new();
    let resp: CategoriesResponse = ctx.server().get("/posts/categories").await.json();
    assert_eq!(resp.categories, ctx.categorizer.list_labels());
    assert_eq!(resp.categories, vec!["cursor", "general", "lovable", "windsurf"]);
    assert_eq!(resp.feedback_categories.len(), 6);
    assert!(resp.feedback_categories.contains(&"Feature Requests".to_string()));
}

/// Blocks until released.
struct GatedJob {
    gate: Arc<Notify>,
}

#[async_trait]
impl Job for GatedJob {
    fn name(&self) -> &str {
        "gated"
    }

    async fn run(&self) -> anyhow::Result<String> {
        self.gate.notified().await;
        Ok("released".to_string())
    }
}

#[tokio::test]
async fn test_job_endpoints() {
    let gate = Arc::new(Notify::new());
    let ctx = TestContext::with_scheduler(
        Scheduler::new()
            .register(GatedJob { gate: gate.clone() }, Duration::from_secs(3600))
            .unwrap(),
    );
    let server = ctx.server();

    let jobs: serde_json::Value = server.get("/jobs").await.json();
    assert_eq!(jobs[0]["name"], "gated");
    assert_eq!(jobs[0]["interval_secs"], 3600);
    assert_eq!(jobs[0]["running"], false);

    let resp = server.post("/jobs/gated/run").await;
    resp.assert_status(StatusCode::ACCEPTED);
    assert_eq!(resp.json::<serde_json::Value>()["result"], "accepted");

    let resp = server.post("/jobs/gated/run").await;
    resp.assert_status(StatusCode::CONFLICT);
    assert_eq!(resp.json::<serde_json::Value>()["result"], "already_running");

    let resp = server.post("/jobs/nope/run").await;
    resp.assert_status(StatusCode::NOT_FOUND);

    gate.notify_one();
    for _ in 0..100 {
        if ctx.scheduler.status("gated").is_some_and(|s| s.runs == 1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let jobs: serde_json::Value = server.get("/jobs").await.json();
    assert_eq!(jobs[0]["runs"], 1);
    assert_eq!(jobs[0]["skipped_overlaps"], 1);
    assert_eq!(jobs[0]["last_outcome"]["outcome"], "succeeded");
    assert_eq!(jobs[0]["last_outcome"]["summary"], "released");

    ctx.scheduler.shutdown().await;
    let resp = server.post("/jobs/gated/run").await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();

    health().clickhouse.set_unhealthy("connection refused");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let resp = server.get("/health").await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let report: HealthResponse = resp.json();
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(!report.clickhouse_connected);

    health().clickhouse.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let report: HealthResponse = resp.json();
    assert_ne!(report.status, HealthStatus::Unhealthy);
    assert!(report.clickhouse_connected);
    assert!(report
        .components
        .iter()
        .any(|c| c.name == "clickhouse" && c.healthy));
}
