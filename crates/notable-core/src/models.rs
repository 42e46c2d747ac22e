//! Core data models for notable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A note with its embedded tag and attachment collections.
///
/// `tags` and `attachments` keep insertion order and may hold duplicates;
/// appending never deduplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub attachments: Vec<String>,
    pub favorite: bool,
    pub pinned: bool,
    pub in_trash: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Note {
    /// Current value of a status flag.
    pub fn flag(&self, flag: StatusFlag) -> bool {
        match flag {
            StatusFlag::Favorite => self.favorite,
            StatusFlag::Pinned => self.pinned,
            StatusFlag::InTrash => self.in_trash,
        }
    }

    /// Current contents of a collection field.
    pub fn collection(&self, field: CollectionField) -> &[String] {
        match field {
            CollectionField::Tags => &self.tags,
            CollectionField::Attachments => &self.attachments,
        }
    }
}

/// Request for creating a new note.
#[derive(Debug, Clone, Default)]
pub struct CreateNoteRequest {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub attachments: Vec<String>,
    pub favorite: bool,
    pub pinned: bool,
    pub in_trash: bool,
}

/// Per-user listing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteFilter {
    /// Every note owned by the user.
    #[default]
    All,
    /// `favorite = true`
    Favorites,
    /// At least one tag.
    Tagged,
    /// No tags.
    Untagged,
    /// `in_trash = true`
    Trash,
}

impl NoteFilter {
    /// Whether `note` passes this filter.
    pub fn matches(self, note: &Note) -> bool {
        match self {
            NoteFilter::All => true,
            NoteFilter::Favorites => note.favorite,
            NoteFilter::Tagged => !note.tags.is_empty(),
            NoteFilter::Untagged => note.tags.is_empty(),
            NoteFilter::Trash => note.in_trash,
        }
    }

    /// SQL predicate appended to `WHERE user_id = $1`.
    pub fn sql_predicate(self) -> &'static str {
        match self {
            NoteFilter::All => "",
            NoteFilter::Favorites => "AND favorite = true",
            NoteFilter::Tagged => "AND jsonb_array_length(tags) > 0",
            NoteFilter::Untagged => "AND jsonb_array_length(tags) = 0",
            NoteFilter::Trash => "AND in_trash = true",
        }
    }
}

/// Collection-valued note fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionField {
    Tags,
    Attachments,
}

impl CollectionField {
    /// Column name in the `notes` table.
    pub fn column(self) -> &'static str {
        match self {
            CollectionField::Tags => "tags",
            CollectionField::Attachments => "attachments",
        }
    }
}

impl std::fmt::Display for CollectionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Independently settable boolean note columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    Favorite,
    Pinned,
    InTrash,
}

impl StatusFlag {
    /// Column name in the `notes` table.
    pub fn column(self) -> &'static str {
        match self {
            StatusFlag::Favorite => "favorite",
            StatusFlag::Pinned => "pinned",
            StatusFlag::InTrash => "in_trash",
        }
    }
}

/// Partial status patch; each present flag is applied as its own update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub favorite: Option<bool>,
    pub pinned: Option<bool>,
    pub in_trash: Option<bool>,
}

impl StatusUpdate {
    /// The flags present in this patch, in column order.
    pub fn changes(&self) -> Vec<(StatusFlag, bool)> {
        [
            (StatusFlag::Favorite, self.favorite),
            (StatusFlag::Pinned, self.pinned),
            (StatusFlag::InTrash, self.in_trash),
        ]
        .into_iter()
        .filter_map(|(flag, value)| value.map(|v| (flag, v)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.favorite.is_none() && self.pinned.is_none() && self.in_trash.is_none()
    }
}

/// Edit applied to a collection field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOp {
    /// Append to the end, keeping any existing equal entries.
    Append(String),
    /// Drop every entry equal to the value.
    Remove(String),
}

impl CollectionOp {
    /// Produce the new collection from the current one.
    pub fn apply(&self, current: &[String]) -> Vec<String> {
        match self {
            CollectionOp::Append(value) => {
                let mut next = current.to_vec();
                next.push(value.clone());
                next
            }
            CollectionOp::Remove(value) => {
                current.iter().filter(|v| *v != value).cloned().collect()
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CollectionOp::Append(_) => "append",
            CollectionOp::Remove(_) => "remove",
        }
    }
}

/// A collection value read together with the row's `modified_at`, used as the
/// compare-and-swap token for the following write.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub values: Vec<String>,
    pub modified_at: DateTime<Utc>,
}

// =============================================================================
// USER TYPES
// =============================================================================

/// A locally stored user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub phone_number: Option<String>,
    /// Identity provider uid this user was registered with.
    pub provider_uid: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request for inserting a local user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub phone_number: Option<String>,
    pub provider_uid: Option<String>,
}

// =============================================================================
// IDENTITY PROVIDER TYPES
// =============================================================================

/// Account created at the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAccount {
    pub uid: String,
    /// Provider-issued ID token for the new account (used for cleanup).
    #[serde(skip_serializing)]
    pub id_token: Option<String>,
}

/// Identity extracted from a verified provider assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub uid: String,
    pub email: Option<String>,
}
