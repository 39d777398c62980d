//! Application state shared across handlers.

use std::sync::Arc;

use harvest_core::{CorpusStore, KeywordCategorizer};
use worker::SchedulerHandle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Corpus store (ClickHouse in production, in-memory in tests)
    pub store: Arc<dyn CorpusStore>,
    /// Keyword table used to tag created posts and validate filters
    pub categorizer: Arc<KeywordCategorizer>,
    /// Names the `category` filter and post updates are checked against
    pub feedback_categories: Arc<Vec<String>>,
    /// Job status and manual triggers
    pub scheduler: SchedulerHandle,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        categorizer: Arc<KeywordCategorizer>,
        feedback_categories: Vec<String>,
        scheduler: SchedulerHandle,
    ) -> Self {
        Self {
            store,
            categorizer,
            feedback_categories: Arc::new(feedback_categories),
            scheduler,
        }
    }
}
