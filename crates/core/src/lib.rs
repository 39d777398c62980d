//! Core types, validation, and categorization for the post harvester.

pub mod analysis;
pub mod categorizer;
pub mod error;
pub mod filter;
pub mod limits;
pub mod post;
pub mod store;
pub mod user_action;

pub use analysis::*;
pub use categorizer::KeywordCategorizer;
pub use error::{Error, ErrorCategory, Result};
pub use filter::{validate_category, PostFilter};
pub use post::*;
pub use store::CorpusStore;
pub use user_action::{ActionKey, ActionPage, ActionType, NewUserAction, UserAction};
