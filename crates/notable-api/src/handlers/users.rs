//! User routes under `/users`: registration, login, session checks.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use notable_auth::{AuthError, RegisterRequest};
use notable_core::Error;

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::handlers::message;
use crate::validation::{BodyValidator, EMAIL, PASSWORD, PHONE_NUMBER, TOKEN, USERNAME};
use crate::AppState;

type JsonBody = Result<Json<Value>, JsonRejection>;

pub async fn register(
    State(state): State<AppState>,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let mut v = BodyValidator::new(&body);
    let req = RegisterRequest {
        email: v.string(EMAIL),
        username: v.string(USERNAME),
        password: v.string(PASSWORD),
        phone_number: v.optional_string(PHONE_NUMBER),
    };
    v.finish()?;

    let registration = state.bridge.register(req).await?;
    let user = registration.user;
    Ok(Json(json!({
        "message": "User registered successfully",
        "user": {
            "uid": registration.provider_uid,
            "id": user.id,
            "email": user.email,
            "username": user.username,
        },
    })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let mut v = BodyValidator::new(&body);
    let email = v.string(EMAIL);
    let password = v.string(PASSWORD);
    v.finish()?;

    let session = state.bridge.login(&email, &password).await?;
    Ok(Json(json!({
        "message": "Login successful",
        "token": session.token,
        "id": session.user_id,
    })))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let mut v = BodyValidator::new(&body);
    let email = v.string(EMAIL);
    v.finish()?;

    state.bridge.forgot_password(&email).await?;
    Ok(message("Password reset email sent"))
}

/// Report whether the posted session token is valid.
///
/// Failures are `400 {loggedIn: false, error}` rather than 401: the endpoint
/// answers a question, it does not guard a resource.
pub async fn check_auth(State(state): State<AppState>, payload: JsonBody) -> Response {
    let token = payload
        .ok()
        .and_then(|Json(body)| {
            let mut v = BodyValidator::new(&body);
            v.optional_string(TOKEN)
        })
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return check_failed("jwt must be provided");
    };

    match state.bridge.check(&token) {
        Ok(claims) => Json(json!({ "loggedIn": true, "user": claims })).into_response(),
        Err(e) => check_failed(&e.to_string()),
    }
}

fn check_failed(error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "loggedIn": false, "error": error })),
    )
        .into_response()
}

/// Resolve the local user behind a provider ID token.
pub async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(assertion) = bearer_token(&headers) else {
        return user_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    match state.bridge.resolve_provider_user(assertion).await {
        Ok(user) => Json(json!({ "user": user })).into_response(),
        Err(AuthError::Core(Error::UserNotFound(_))) => {
            user_error(StatusCode::NOT_FOUND, "User not found")
        }
        Err(AuthError::Core(Error::Provider(msg) | Error::Unauthorized(msg))) => {
            debug!(
                subsystem = "api",
                component = "users",
                op = "current_user",
                error = %msg,
                "Provider token rejected"
            );
            user_error(StatusCode::UNAUTHORIZED, &msg)
        }
        Err(other) => ApiError::from(other).into_response(),
    }
}

fn user_error(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

/// Sessions are stateless; the client drops its token.
pub async fn logout() -> impl IntoResponse {
    message("Logout successful")
}
