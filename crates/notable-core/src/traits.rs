//! Core traits for notable abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Repository for note storage.
///
/// Collection fields are exposed as primitive read / conditional-write pairs;
/// the read-modify-write sequence itself lives in the note mutator.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note, assigning its id and timestamps.
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note>;

    /// Fetch a note by id.
    async fn fetch(&self, id: i64) -> Result<Option<Note>>;

    /// List every note.
    async fn list_all(&self) -> Result<Vec<Note>>;

    /// List a user's notes matching `filter`.
    async fn list_for_user(&self, user_id: i64, filter: NoteFilter) -> Result<Vec<Note>>;

    /// Distinct tag values across a user's notes, sorted.
    async fn distinct_tags(&self, user_id: i64) -> Result<Vec<String>>;

    /// Replace title and content. Returns false if the note does not exist.
    async fn update_content(&self, id: i64, title: &str, content: &str) -> Result<bool>;

    /// Set one status column. Returns false if the note does not exist.
    async fn update_flag(&self, id: i64, flag: StatusFlag, value: bool) -> Result<bool>;

    /// Read a collection field with the row's current `modified_at`.
    async fn read_collection(
        &self,
        id: i64,
        field: CollectionField,
    ) -> Result<Option<CollectionSnapshot>>;

    /// Write a collection field only if `modified_at` still equals
    /// `expected_modified_at`. Returns false when the row changed (or vanished).
    async fn write_collection(
        &self,
        id: i64,
        field: CollectionField,
        values: &[String],
        expected_modified_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool>;

    /// Permanently delete a note. Deleting a missing id is not an error.
    async fn hard_delete(&self, id: i64) -> Result<()>;
}

// =============================================================================
// USER REPOSITORY TRAITS
// =============================================================================

/// Repository for local user rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails if the email is already registered.
    async fn insert(&self, user: NewUser) -> Result<User>;

    /// Look up a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by identity provider uid.
    async fn find_by_provider_uid(&self, uid: &str) -> Result<Option<User>>;
}

// =============================================================================
// IDENTITY PROVIDER TRAITS
// =============================================================================

/// External identity provider (credential store).
///
/// Failures surface as [`crate::Error::Provider`] carrying the provider's own
/// message; this layer does not interpret provider error codes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an email/password credential.
    async fn create_credential(&self, email: &str, password: &str) -> Result<ProviderAccount>;

    /// Run the provider's password verification, returning an assertion
    /// (ID token).
    async fn sign_in(&self, email: &str, password: &str) -> Result<String>;

    /// Exchange an assertion for a verified identity.
    async fn verify_assertion(&self, assertion: &str) -> Result<ProviderIdentity>;

    /// Generate a password reset link for `email`.
    async fn generate_reset_link(&self, email: &str) -> Result<String>;

    /// Delete a credential created by [`IdentityProvider::create_credential`].
    async fn delete_credential(&self, account: &ProviderAccount) -> Result<()>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Delivery of password reset links.
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset_link(&self, email: &str, link: &str) -> Result<()>;
}
