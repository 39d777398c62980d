//! Standardized API responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use harvest_core::error::ValidationErrorCode;
use harvest_core::{Post, UserAction};
use serde::{Deserialize, Serialize};
use telemetry::{ComponentHealthReport, HealthStatus};
use worker::{SchedulerError, TriggerResult};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub clickhouse_connected: bool,
    pub components: Vec<ComponentHealthReport>,
    pub pending_enrichment: u64,
}

/// One page of posts.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub count: usize,
    pub offset: u64,
    pub limit: u32,
}

/// One page of user actions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionListResponse {
    pub actions: Vec<UserAction>,
    pub count: usize,
    pub offset: u64,
    pub limit: u32,
}

/// Values accepted by the `keyword_category` and `category` filters.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    /// Keyword labels, for `keyword_category`
    pub categories: Vec<String>,
    /// Feedback categories, for `category`
    pub feedback_categories: Vec<String>,
}

/// Result of a manual job trigger.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub job: String,
    pub result: TriggerResult,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error carrying a status and an error code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(
            StatusCode::BAD_REQUEST,
            ValidationErrorCode::InvalidPayload.code(),
            msg,
        )
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
    }

    pub fn validation(code: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new("Validation failed", code).with_details(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<harvest_core::Error> for ApiError {
    fn from(err: harvest_core::Error) -> Self {
        use harvest_core::Error;

        let status = StatusCode::from_u16(err.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match &err {
            Error::ValidationWithCode { code, message, .. } => {
                ApiError::with_code(status, *code, message)
            }
            Error::Database { code, message, .. } => ApiError::with_code(status, *code, message),
            Error::NotFound(_) | Error::Conflict { .. } => {
                ApiError::with_code(status, err.error_code().unwrap_or("INTERNAL"), err.to_string())
            }
            Error::Validation(msg) => ApiError::bad_request(msg),
            Error::Serialization(e) => ApiError::bad_request(e.to_string()),
            _ => ApiError::internal(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        ApiError::validation(ValidationErrorCode::InvalidPayload.code(), details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::UnknownJob(_) => ApiError::not_found(err.to_string()),
            SchedulerError::ShuttingDown => ApiError::unavailable(err.to_string()),
            SchedulerError::ZeroInterval(_) | SchedulerError::DuplicateJob(_) => {
                ApiError::internal(err.to_string())
            }
        }
    }
}
