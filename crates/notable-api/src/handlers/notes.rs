//! Note routes under `/notes`.
//!
//! Every route requires a session. Ownership is not checked; mutations log
//! the caller's user id next to the note id so it can be audited.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;
use tracing::info;

use notable_core::{CreateNoteRequest, Note, NoteFilter, StatusUpdate};

use crate::auth::RequireSession;
use crate::error::ApiError;
use crate::handlers::message;
use crate::validation::{
    BodyValidator, ATTACHMENT, ATTACHMENTS, CONTENT, FAVORITE, IN_TRASH, NOTE_ID, PINNED, TAG,
    TAGS, TITLE, USER_ID,
};
use crate::AppState;

type JsonBody = Result<Json<Value>, JsonRejection>;
type IdPath = Result<Path<i64>, PathRejection>;

// =============================================================================
// LISTINGS
// =============================================================================

pub async fn list_notes(
    State(state): State<AppState>,
    _session: RequireSession,
) -> Result<Json<Vec<Note>>, ApiError> {
    Ok(Json(state.notes.list_all().await?))
}

async fn list_filtered(
    state: &AppState,
    path: IdPath,
    filter: NoteFilter,
) -> Result<Json<Vec<Note>>, ApiError> {
    let Path(user_id) = path?;
    Ok(Json(state.notes.list_for_user(user_id, filter).await?))
}

pub async fn list_user_notes(
    State(state): State<AppState>,
    _session: RequireSession,
    path: IdPath,
) -> Result<Json<Vec<Note>>, ApiError> {
    list_filtered(&state, path, NoteFilter::All).await
}

pub async fn list_favorites(
    State(state): State<AppState>,
    _session: RequireSession,
    path: IdPath,
) -> Result<Json<Vec<Note>>, ApiError> {
    list_filtered(&state, path, NoteFilter::Favorites).await
}

pub async fn list_tagged(
    State(state): State<AppState>,
    _session: RequireSession,
    path: IdPath,
) -> Result<Json<Vec<Note>>, ApiError> {
    list_filtered(&state, path, NoteFilter::Tagged).await
}

pub async fn list_untagged(
    State(state): State<AppState>,
    _session: RequireSession,
    path: IdPath,
) -> Result<Json<Vec<Note>>, ApiError> {
    list_filtered(&state, path, NoteFilter::Untagged).await
}

pub async fn list_trash(
    State(state): State<AppState>,
    _session: RequireSession,
    path: IdPath,
) -> Result<Json<Vec<Note>>, ApiError> {
    list_filtered(&state, path, NoteFilter::Trash).await
}

/// Distinct tags across the user's notes, sorted.
pub async fn all_tags(
    State(state): State<AppState>,
    _session: RequireSession,
    path: IdPath,
) -> Result<Json<Vec<String>>, ApiError> {
    let Path(user_id) = path?;
    Ok(Json(state.notes.distinct_tags(user_id).await?))
}

// =============================================================================
// NOTE WRITES
// =============================================================================

pub async fn create_note(
    State(state): State<AppState>,
    session: RequireSession,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let mut v = BodyValidator::new(&body);
    let req = CreateNoteRequest {
        user_id: v.int(USER_ID),
        title: v.string(TITLE),
        content: v.string(CONTENT),
        tags: v.optional_string_list(TAGS).unwrap_or_default(),
        attachments: v.optional_string_list(ATTACHMENTS).unwrap_or_default(),
        favorite: v.optional_bool(FAVORITE).unwrap_or(false),
        pinned: v.optional_bool(PINNED).unwrap_or(false),
        in_trash: v.optional_bool(IN_TRASH).unwrap_or(false),
    };
    v.finish()?;

    let note = state.notes.insert(req).await?;
    info!(
        subsystem = "api",
        component = "notes",
        op = "create_note",
        note_id = note.id,
        user_id = session.user_id(),
        "Note created"
    );
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_note(
    State(state): State<AppState>,
    session: RequireSession,
    path: IdPath,
    payload: JsonBody,
) -> Result<Json<Note>, ApiError> {
    let Path(id) = path?;
    let Json(body) = payload?;
    let mut v = BodyValidator::new(&body);
    let title = v.string(TITLE);
    let content = v.string(CONTENT);
    v.finish()?;

    let note = state.mutator.update_content(id, &title, &content).await?;
    info!(
        subsystem = "api",
        component = "notes",
        op = "update_note",
        note_id = id,
        user_id = session.user_id(),
        "Note updated"
    );
    Ok(Json(note))
}

pub async fn update_status(
    State(state): State<AppState>,
    session: RequireSession,
    path: IdPath,
    payload: JsonBody,
) -> Result<Json<Note>, ApiError> {
    let Path(id) = path?;
    let Json(body) = payload?;
    let mut v = BodyValidator::new(&body);
    let update = StatusUpdate {
        favorite: v.optional_bool(FAVORITE),
        pinned: v.optional_bool(PINNED),
        in_trash: v.optional_bool(IN_TRASH),
    };
    v.finish()?;

    let note = state.mutator.update_status(id, update).await?;
    info!(
        subsystem = "api",
        component = "notes",
        op = "update_status",
        note_id = id,
        user_id = session.user_id(),
        flags = update.changes().len(),
        "Note status updated"
    );
    Ok(Json(note))
}

/// Permanent delete. A missing note is not an error.
pub async fn delete_note(
    State(state): State<AppState>,
    session: RequireSession,
    path: IdPath,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = path?;
    state.notes.hard_delete(id).await?;
    info!(
        subsystem = "api",
        component = "notes",
        op = "delete_note",
        note_id = id,
        user_id = session.user_id(),
        "Note deleted"
    );
    Ok(message("Note deleted permanently"))
}

// =============================================================================
// TAGS AND ATTACHMENTS
// =============================================================================

/// Which collection entry a request names.
#[derive(Clone, Copy)]
enum Entry {
    Tag,
    Attachment,
}

async fn edit_collection(
    state: &AppState,
    session: &RequireSession,
    payload: JsonBody,
    entry: Entry,
    remove: bool,
) -> Result<(), ApiError> {
    let Json(body) = payload?;
    let mut v = BodyValidator::new(&body);
    let note_id = v.int(NOTE_ID);
    let value = v.string(match entry {
        Entry::Tag => TAG,
        Entry::Attachment => ATTACHMENT,
    });
    v.finish()?;

    let values = match (entry, remove) {
        (Entry::Tag, false) => state.mutator.add_tag(note_id, &value).await?,
        (Entry::Tag, true) => state.mutator.remove_tag(note_id, &value).await?,
        (Entry::Attachment, false) => state.mutator.add_attachment(note_id, &value).await?,
        (Entry::Attachment, true) => state.mutator.remove_attachment(note_id, &value).await?,
    };
    let op = if remove { "remove_entry" } else { "add_entry" };
    info!(
        subsystem = "api",
        component = "notes",
        op,
        note_id,
        user_id = session.user_id(),
        result_count = values.len(),
        "Note collection updated"
    );
    Ok(())
}

pub async fn create_tag(
    State(state): State<AppState>,
    session: RequireSession,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    edit_collection(&state, &session, payload, Entry::Tag, false).await?;
    Ok((StatusCode::CREATED, message("Tag added successfully")))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    session: RequireSession,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    edit_collection(&state, &session, payload, Entry::Tag, true).await?;
    Ok(message("Tag deleted successfully"))
}

pub async fn create_attachment(
    State(state): State<AppState>,
    session: RequireSession,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    edit_collection(&state, &session, payload, Entry::Attachment, false).await?;
    Ok((StatusCode::CREATED, message("Attachment added successfully")))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    session: RequireSession,
    payload: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    edit_collection(&state, &session, payload, Entry::Attachment, true).await?;
    Ok(message("Attachment deleted successfully"))
}
