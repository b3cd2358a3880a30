//! JSON error envelope returned for every failed request.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Environment;

const VALIDATION_KEYWORDS: [&str; 4] = ["must be", "cannot be", "is required", "invalid"];
const NOT_FOUND_KEYWORD: &str = "not found";
const MASKED_INTERNAL_MESSAGE: &str = "Something went wrong";

/// Body of every error response: `{"error": <category>, "message": <text>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Please try again later")]
    TooManyRequests { retry_after: Duration },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map a free-form error message onto a response category by keyword.
    ///
    /// Internal messages are replaced with a generic text in production.
    pub fn classify(message: &str, environment: Environment) -> Self {
        let lower = message.to_lowercase();

        if VALIDATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ApiError::Validation(message.to_string());
        }
        if lower.contains(NOT_FOUND_KEYWORD) {
            return ApiError::NotFound(message.to_string());
        }

        if environment.is_production() {
            ApiError::Internal(MASKED_INTERNAL_MESSAGE.to_string())
        } else {
            ApiError::Internal(message.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `error` field of the envelope.
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Validation Error",
            ApiError::NotFound(_) => "Not Found",
            ApiError::TooManyRequests { .. } => "Too Many Requests",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.category().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();

        if let ApiError::TooManyRequests { retry_after } = self {
            let secs = ceil_secs(retry_after).max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

/// Whole seconds, rounded up.
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let millis = duration.as_millis() as u64;
    millis / 1000 + u64::from(millis % 1000 != 0)
}
