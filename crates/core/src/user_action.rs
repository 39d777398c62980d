//! End-user actions recorded against posts.
//!
//! An action is identified by `(user_ref, post_id, action_type)`: a user
//! likes a post at most once, and recording the same action again replaces
//! its metadata.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, ValidationErrorCode};
use crate::limits::{DEFAULT_ACTION_PAGE_LIMIT, MAX_ACTION_PAGE_LIMIT};
use crate::post::validate_json_size;

/// What a user did to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    View,
    Like,
    Save,
    Share,
    Report,
    Comment,
    Follow,
    Unfollow,
    Mute,
    Block,
}

impl ActionType {
    pub const ALL: [ActionType; 10] = [
        Self::View,
        Self::Like,
        Self::Save,
        Self::Share,
        Self::Report,
        Self::Comment,
        Self::Follow,
        Self::Unfollow,
        Self::Mute,
        Self::Block,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Like => "like",
            Self::Save => "save",
            Self::Share => "share",
            Self::Report => "report",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Mute => "mute",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == wanted)
            .ok_or_else(|| {
                let options: Vec<&str> = Self::ALL.iter().map(ActionType::as_str).collect();
                Error::validation_code(
                    ValidationErrorCode::InvalidFilter,
                    format!(
                        "Invalid action_type '{}'. Available options: {}",
                        wanted,
                        options.join(", ")
                    ),
                )
            })
    }
}

/// Identity of a recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub user_ref: String,
    pub post_id: Uuid,
    pub action_type: ActionType,
}

/// Payload for recording an action.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUserAction {
    /// Opaque reference to the acting user
    #[validate(length(min = 1, max = 128))]
    pub user_ref: String,
    pub post_id: Uuid,
    pub action_type: ActionType,
    #[serde(default)]
    #[validate(custom(function = "validate_json_size"))]
    pub metadata: serde_json::Value,
}

impl NewUserAction {
    pub fn key(&self) -> ActionKey {
        ActionKey {
            user_ref: self.user_ref.clone(),
            post_id: self.post_id,
            action_type: self.action_type,
        }
    }
}

/// A stored action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub id: Uuid,
    pub user_ref: String,
    pub post_id: Uuid,
    pub action_type: ActionType,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAction {
    pub fn from_new(new: NewUserAction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_ref: new.user_ref,
            post_id: new.post_id,
            action_type: new.action_type,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ActionKey {
        ActionKey {
            user_ref: self.user_ref.clone(),
            post_id: self.post_id,
            action_type: self.action_type,
        }
    }

    /// Records the same action again. Keeps `id` and `created_at`.
    pub fn rerecord(&mut self, metadata: serde_json::Value) {
        self.metadata = metadata;
        self.updated_at = Utc::now().max(self.updated_at + chrono::Duration::milliseconds(1));
    }

    /// Records `new` on top of `existing`, or starts a fresh action.
    pub fn record(existing: Option<UserAction>, new: NewUserAction) -> Self {
        match existing {
            Some(mut action) => {
                action.rerecord(new.metadata);
                action
            }
            None => Self::from_new(new),
        }
    }
}

fn default_action_limit() -> u32 {
    DEFAULT_ACTION_PAGE_LIMIT
}

/// Offset/limit for action listings, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ActionPage {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_action_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
}

impl Default for ActionPage {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_ACTION_PAGE_LIMIT,
        }
    }
}

impl ActionPage {
    pub fn check(&self) -> crate::error::Result<()> {
        self.validate().map_err(|_| {
            Error::validation_code(
                ValidationErrorCode::InvalidPagination,
                format!(
                    "Invalid limit {}. Must be between 1 and {}",
                    self.limit, MAX_ACTION_PAGE_LIMIT
                ),
            )
        })
    }

    /// Applies the page to an already sorted list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}
