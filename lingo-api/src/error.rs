//! Error types for lingo-api
//!
//! Every handler returns [`ApiResult`]. Internal failures are logged with
//! their cause and rendered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lingo_common::Feature;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the role or ownership required (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Plan grants none of this feature (403)
    #[error("Usage restricted on {0}")]
    UsageRestricted(Feature),

    /// Plan allowance for the current period is used up (403)
    #[error("Usage limit reached on {0}")]
    UsageLimitReached(Feature),

    /// Speech recognition produced nothing (400)
    #[error("No transcript produced")]
    NoTranscript,

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Caller has not created a learner profile yet (404)
    #[error("Profile not found")]
    ProfileNotFound,

    /// Conflict with existing state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// lingo-common error
    #[error("Common error: {0}")]
    Common(#[from] lingo_common::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// Status, machine-readable code and caller-facing message
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::UsageRestricted(feature) => (
                StatusCode::FORBIDDEN,
                "USAGE_RESTRICTED",
                format!("Usage restricted on {}", feature),
            ),
            ApiError::UsageLimitReached(feature) => (
                StatusCode::FORBIDDEN,
                "USAGE_LIMIT_REACHED",
                format!("Usage limit reached on {}", feature),
            ),
            ApiError::NoTranscript => (
                StatusCode::BAD_REQUEST,
                "NO_TRANSCRIPT",
                "No transcript could be produced from the audio".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::ProfileNotFound => (
                StatusCode::NOT_FOUND,
                "PROFILE_NOT_FOUND",
                "Profile not found".to_string(),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                internal()
            }
            ApiError::Common(err) => match err {
                lingo_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                lingo_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
                }
                other => {
                    error!("Internal error: {}", other);
                    internal()
                }
            },
            ApiError::Database(err) => {
                error!("Database error: {}", err);
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors_are_forbidden_with_codes() {
        let (status, code, message) = ApiError::UsageLimitReached(Feature::NaturalTts).parts();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "USAGE_LIMIT_REACHED");
        assert_eq!(message, "Usage limit reached on natural_tts");

        let (status, code, _) = ApiError::UsageRestricted(Feature::BasicAudiobooks).parts();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "USAGE_RESTRICTED");
    }

    #[test]
    fn test_missing_profile_has_its_own_code() {
        let (status, code, _) = ApiError::ProfileNotFound.parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "PROFILE_NOT_FOUND");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let (status, code, message) =
            ApiError::Internal("connection refused to 10.0.0.3".to_string()).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("10.0.0.3"));
    }

    #[test]
    fn test_common_errors_map_by_variant() {
        let (status, _, _) =
            ApiError::from(lingo_common::Error::NotFound("deck".to_string())).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) =
            ApiError::from(lingo_common::Error::InvalidInput("plan".to_string())).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) =
            ApiError::from(lingo_common::Error::Config("x".to_string())).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
