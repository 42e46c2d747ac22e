//! HTTP error mapping.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use notable_auth::AuthError;

/// One failed request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by handlers and extractors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing, invalid or expired session token. Body: `{message}`.
    #[error("{0}")]
    Unauthorized(String),

    /// Request body failed validation. Body: `{errors: [...]}`.
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(notable_core::Error),
}

impl From<notable_core::Error> for ApiError {
    fn from(err: notable_core::Error) -> Self {
        use notable_core::Error;

        // Constraint violations are client errors, not server faults.
        if let Error::Database(sqlx_err) = &err {
            if let Some(db_err) = sqlx_err.as_database_error() {
                if db_err.is_unique_violation() {
                    return ApiError::Conflict(db_err.message().to_string());
                }
                if db_err.is_foreign_key_violation() {
                    return ApiError::BadRequest(db_err.message().to_string());
                }
            }
        }

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::NoteNotFound(_) => ApiError::NotFound("Note not found".to_string()),
            Error::UserNotFound(_) => ApiError::NotFound("User not found".to_string()),
            Error::Provider(msg) | Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Token(_) => ApiError::Unauthorized("Token is not valid".to_string()),
            other => ApiError::from(notable_core::Error::from(other)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("body", rejection.body_text())])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("id", rejection.body_text())])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "message": msg })),
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, json!({ "errors": errors })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::Internal(err) => {
                error!(
                    subsystem = "api",
                    component = "error",
                    error = %err,
                    "Request failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notable_auth::TokenError;
    use notable_core::Error;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_core_error_status_codes() {
        assert_eq!(status_of(Error::NoteNotFound(4).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(Error::UserNotFound("a@b.c".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(Error::Provider("EMAIL_EXISTS".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(Error::Conflict("note 1 tags".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(Error::Internal("boom".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(Error::Database(sqlx::Error::PoolTimedOut).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_message_kept_verbatim() {
        match ApiError::from(Error::Provider("INVALID_PASSWORD".into())) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "INVALID_PASSWORD"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_token_error_is_unauthorized() {
        let err = ApiError::from(AuthError::Token(TokenError::Expired));
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token is not valid"));
    }
}
