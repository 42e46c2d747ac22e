//! # notable-api
//!
//! HTTP surface for notable: the axum router, session extractor, request
//! validation and error mapping. The `notable-api` binary wires these to the
//! configured storage and identity provider.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod validation;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use notable_auth::IdentityBridge;
use notable_core::NoteRepository;
use notable_db::NoteMutator;

pub use auth::RequireSession;
pub use config::ApiConfig;
pub use error::{ApiError, FieldError};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<dyn NoteRepository>,
    pub mutator: NoteMutator,
    pub bridge: IdentityBridge,
}

impl AppState {
    pub fn new(notes: Arc<dyn NoteRepository>, bridge: IdentityBridge) -> Self {
        Self {
            mutator: NoteMutator::new(notes.clone()),
            notes,
            bridge,
        }
    }
}

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// ROUTER
// =============================================================================

fn note_routes() -> Router<AppState> {
    use crate::handlers::notes::*;

    Router::new()
        .route("/", get(list_notes))
        .route("/user/:id", get(list_user_notes))
        .route("/user/:id/favorites", get(list_favorites))
        .route("/user/:id/tags", get(list_tagged))
        .route("/user/:id/untagged", get(list_untagged))
        .route("/user/:id/trash", get(list_trash))
        .route("/user/:id/all-tags", get(all_tags))
        .route("/create-note", post(create_note))
        .route("/update-note/:id", put(update_note))
        .route("/create-tag", post(create_tag))
        .route("/delete-tag", delete(delete_tag))
        .route("/create-attachment", post(create_attachment))
        .route("/delete-attachment", delete(delete_attachment))
        .route("/update-status/:id", put(update_status))
        .route("/delete-note/:id", delete(delete_note))
}

fn user_routes() -> Router<AppState> {
    use crate::handlers::users::*;

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/check-auth", post(check_auth))
        .route("/user", get(current_user))
        .route("/logout", post(logout))
}

/// All routes, without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/notes", note_routes())
        .nest("/users", user_routes())
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Wrap `router` in tracing, request ids, CORS and a body limit.
pub fn with_middleware(
    router: Router,
    allowed_origins: Vec<HeaderValue>,
    body_limit_bytes: usize,
) -> Router {
    router
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
}
