//! Session authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use notable_auth::SessionClaims;

use crate::error::ApiError;
use crate::AppState;

/// Returns the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extractor that requires a valid session token.
///
/// Usage:
/// ```ignore
/// async fn my_handler(session: RequireSession) -> impl IntoResponse {
///     tracing::info!(user_id = session.user_id(), "handled");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireSession {
    pub claims: SessionClaims,
}

impl RequireSession {
    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            ApiError::Unauthorized("No token, authorization denied".to_string())
        })?;

        match state.bridge.check(token) {
            Ok(claims) => Ok(RequireSession { claims }),
            Err(e) => {
                debug!(
                    subsystem = "api",
                    component = "auth",
                    op = "verify",
                    reason = %e,
                    "Session token rejected"
                );
                Err(ApiError::Unauthorized("Token is not valid".to_string()))
            }
        }
    }
}
