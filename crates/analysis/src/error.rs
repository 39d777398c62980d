use std::time::Duration;

use harvest_core::{DecodeError, ErrorCategory};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("analysis request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed analysis response: {0}")]
    Malformed(String),

    #[error("analysis provider rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("analysis provider error (status {status:?}): {message}")]
    Service {
        status: Option<u16>,
        message: String,
    },

    #[error("network error: {0}")]
    Transport(String),
}

impl AnalysisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Malformed(_) => ErrorCategory::MalformedResponse,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Service { .. } => ErrorCategory::Service,
            Self::Transport(_) => ErrorCategory::Transport,
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            status: None,
            message: message.into(),
        }
    }
}

impl From<DecodeError> for AnalysisError {
    fn from(err: DecodeError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if err.is_timeout() {
            // The HTTP client deadline is a backstop; the retry layer
            // normally reports its own timeout first
            Self::Transport(format!("http timeout: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
