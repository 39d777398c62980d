//! Candidate posts and canned analysis results.

use std::collections::{BTreeMap, BTreeSet};

use harvest_core::{
    CandidatePost, ContentCategorization, NewPost, Platform, ProductExtraction, ProductMention,
    ProductSentiment, Sentiment, SentimentAnalysis,
};

use crate::mocks::MockAnalysisProvider;

/// A Reddit submission found in r/vscode.
pub fn reddit_candidate(id: &str, text: &str) -> CandidatePost {
    CandidatePost {
        platform: Platform::Reddit,
        platform_id: id.to_string(),
        url: format!("https://reddit.com/r/vscode/comments/{}/", id),
        author: Some("dev_user".to_string()),
        author_id: Some(format!("t2_{}", id)),
        author_avatar_url: None,
        title: None,
        text: text.to_string(),
        source_name: "vscode".to_string(),
        raw_metadata: serde_json::json!({ "subreddit": "vscode", "score": 12 }),
    }
}

/// A tweet found by searching `keyword`.
pub fn tweet_candidate(id: &str, text: &str, keyword: &str) -> CandidatePost {
    CandidatePost {
        platform: Platform::Twitter,
        platform_id: id.to_string(),
        url: format!("https://twitter.com/dev/status/{}", id),
        author: Some("dev".to_string()),
        author_id: Some("4242".to_string()),
        author_avatar_url: Some("https://pbs.twimg.com/profile_images/dev.png".to_string()),
        title: None,
        text: text.to_string(),
        source_name: keyword.to_string(),
        raw_metadata: serde_json::json!({ "lang": "en" }),
    }
}

pub fn with_title(mut candidate: CandidatePost, title: &str) -> CandidatePost {
    candidate.title = Some(title.to_string());
    candidate
}

/// Create payload for a candidate, without keyword labels.
pub fn new_post(candidate: CandidatePost) -> NewPost {
    NewPost::from_candidate(candidate, BTreeSet::new())
}

pub fn labels(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Stage 1 result naming `names`.
pub fn products(names: &[&str], confidence: f64) -> ProductExtraction {
    ProductExtraction {
        products: names
            .iter()
            .enumerate()
            .map(|(i, name)| ProductMention {
                name: name.to_string(),
                confidence,
                context: None,
                sentiment: None,
                aspects: Vec::new(),
                is_primary_mention: i == 0,
                version: None,
                features: Vec::new(),
                comparisons: Vec::new(),
                user_type: None,
            })
            .collect(),
        confidence,
        explanation: Some("named in the post".to_string()),
    }
}

/// Stage 2 result with one per-product label for each of `products`.
pub fn sentiment(label: Sentiment, confidence: f64, products: &[&str]) -> SentimentAnalysis {
    SentimentAnalysis {
        sentiment: label,
        product_sentiments: products
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    ProductSentiment {
                        sentiment: label,
                        aspects: BTreeMap::new(),
                        intensity: Some(0.5),
                        confidence: Some(confidence),
                        context: None,
                    },
                )
            })
            .collect(),
        intensity: Some(0.5),
        confidence,
        explanation: Some("tone of the post".to_string()),
        suppressed: false,
    }
}

/// Stage 3 result.
pub fn categorization(category: &str, confidence: f64) -> ContentCategorization {
    ContentCategorization {
        category: category.to_string(),
        confidence,
        explanation: None,
        secondary_categories: Vec::new(),
        keywords: Vec::new(),
        product_context: BTreeMap::new(),
    }
}

/// Provider answering every stage with `sentiment_confidence` for stage 2
/// and 0.9 elsewhere.
pub fn provider(sentiment_confidence: f64) -> MockAnalysisProvider {
    MockAnalysisProvider::new(
        products(&["Cursor"], 0.9),
        sentiment(Sentiment::Negative, sentiment_confidence, &["Cursor"]),
        categorization("bug_report", 0.9),
    )
}
