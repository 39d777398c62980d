//! Unified error types for the post harvester.
//!
//! Error codes:
//! - VALID_001-004: Validation errors (query surface)
//! - DB_001-002: Storage errors
//! - NOT_FOUND / CONFLICT: Record lookup errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure category used for per-run error accounting.
///
/// Connector, analysis, and storage errors all map onto one of these so
/// that batch reports and metrics count them under a stable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Remote unreachable or connection dropped
    Transport,
    /// Remote did not answer within the deadline
    Timeout,
    /// Remote answered but the payload did not decode
    MalformedResponse,
    /// Remote explicitly throttled us
    RateLimit,
    /// Remote answered with a non-throttling failure
    Service,
    /// Caller supplied an unsupported value
    Validation,
    /// Corpus store read or write failed
    Storage,
    /// Anything else
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::RateLimit => "rate_limit",
            Self::Service => "service",
            Self::Validation => "validation",
            Self::Storage => "storage",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Unsupported filter value (platform, sentiment, status, category)
    InvalidFilter,
    /// VALID_002: Keyword category is not in the configured label set
    UnknownKeywordCategory,
    /// VALID_003: Offset/limit out of range
    InvalidPagination,
    /// VALID_004: Post create/update payload rejected
    InvalidPayload,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFilter => "VALID_001",
            Self::UnknownKeywordCategory => "VALID_002",
            Self::InvalidPagination => "VALID_003",
            Self::InvalidPayload => "VALID_004",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Storage error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Read query failed
    QueryFailed,
    /// DB_002: Insert or update failed
    WriteFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueryFailed => "DB_001",
            Self::WriteFailed => "DB_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Unified error type for the post harvester.
#[derive(Debug, Error)]
pub enum Error {
    /// Validation error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Database error with code.
    #[error("[{code}] {message}")]
    Database {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("post already exists: {platform}/{platform_id}")]
    Conflict {
        platform: String,
        platform_id: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a database error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// `what` names the missing record, e.g. `post 6f1c...`.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(platform: impl Into<String>, platform_id: impl Into<String>) -> Self {
        Self::Conflict {
            platform: platform.into(),
            platform_id: platform_id.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::Database { http_status, .. } => *http_status,
            Self::NotFound(_) => 404,
            Self::Conflict { .. } => 409,
            Self::Validation(_) => 400,
            Self::Serialization(_) => 400,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::ValidationWithCode { code, .. } => Some(code),
            Self::Database { code, .. } => Some(code),
            Self::NotFound(_) => Some("NOT_FOUND"),
            Self::Conflict { .. } => Some("CONFLICT"),
            _ => None,
        }
    }

    /// Category this error is counted under in run reports.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationWithCode { .. } | Self::Validation(_) => ErrorCategory::Validation,
            Self::Database { .. } | Self::Conflict { .. } | Self::NotFound(_) => {
                ErrorCategory::Storage
            }
            Self::Serialization(_) => ErrorCategory::MalformedResponse,
            Self::Config(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the caller supplied bad input (surfaced synchronously, never retried).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationWithCode { .. } | Self::Validation(_))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::validation_code(ValidationErrorCode::InvalidPayload, errors.to_string())
    }
}
