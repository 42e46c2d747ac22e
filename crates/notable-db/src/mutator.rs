//! Read-modify-write updates of a note's collection fields and status flags.
//!
//! Tags and attachments live inside the note row, so adding one means reading
//! the list, editing it, and writing it back. Writes for one note are
//! serialized through [`NoteLocks`] within the process, and each write is a
//! compare-and-swap on `modified_at` so a writer in another process is
//! detected and the edit retried against the fresh list.

use std::sync::Arc;

use tracing::{debug, warn};

use notable_core::defaults::CAS_MAX_ATTEMPTS;
use notable_core::{
    CollectionField, CollectionOp, Error, Note, NoteRepository, Result, StatusFlag, StatusUpdate,
};

use crate::locks::NoteLocks;

/// Applies tag, attachment, status and content edits to notes.
#[derive(Clone)]
pub struct NoteMutator {
    notes: Arc<dyn NoteRepository>,
    locks: NoteLocks,
    max_attempts: u32,
}

impl NoteMutator {
    pub fn new(notes: Arc<dyn NoteRepository>) -> Self {
        Self {
            notes,
            locks: NoteLocks::new(),
            max_attempts: CAS_MAX_ATTEMPTS,
        }
    }

    /// Override the number of compare-and-swap attempts (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Apply `op` to a collection field of `note_id`.
    ///
    /// Returns the written collection. Fails with [`Error::NoteNotFound`] if
    /// the note does not exist and [`Error::Conflict`] if every attempt lost
    /// a race with another writer.
    pub async fn apply(
        &self,
        note_id: i64,
        field: CollectionField,
        op: CollectionOp,
    ) -> Result<Vec<String>> {
        let _guard = self.locks.acquire(note_id).await;

        for attempt in 1..=self.max_attempts {
            let snapshot = self
                .notes
                .read_collection(note_id, field)
                .await?
                .ok_or(Error::NoteNotFound(note_id))?;

            let next = op.apply(&snapshot.values);
            if self
                .notes
                .write_collection(note_id, field, &next, snapshot.modified_at)
                .await?
            {
                debug!(
                    subsystem = "db",
                    component = "mutator",
                    op = op.name(),
                    note_id,
                    field = %field,
                    attempt,
                    result_count = next.len(),
                    "Collection updated"
                );
                return Ok(next);
            }

            warn!(
                subsystem = "db",
                component = "mutator",
                op = op.name(),
                note_id,
                field = %field,
                attempt,
                "Concurrent modification detected, retrying"
            );
        }

        Err(Error::Conflict(format!(
            "note {} {} changed concurrently; gave up after {} attempts",
            note_id, field, self.max_attempts
        )))
    }

    pub async fn add_tag(&self, note_id: i64, tag: &str) -> Result<Vec<String>> {
        self.apply(note_id, CollectionField::Tags, CollectionOp::Append(tag.into()))
            .await
    }

    pub async fn remove_tag(&self, note_id: i64, tag: &str) -> Result<Vec<String>> {
        self.apply(note_id, CollectionField::Tags, CollectionOp::Remove(tag.into()))
            .await
    }

    pub async fn add_attachment(&self, note_id: i64, attachment: &str) -> Result<Vec<String>> {
        self.apply(
            note_id,
            CollectionField::Attachments,
            CollectionOp::Append(attachment.into()),
        )
        .await
    }

    pub async fn remove_attachment(&self, note_id: i64, attachment: &str) -> Result<Vec<String>> {
        self.apply(
            note_id,
            CollectionField::Attachments,
            CollectionOp::Remove(attachment.into()),
        )
        .await
    }

    /// Set exactly one status flag.
    pub async fn update_note_field(&self, note_id: i64, flag: StatusFlag, value: bool) -> Result<()> {
        if self.notes.update_flag(note_id, flag, value).await? {
            debug!(
                subsystem = "db",
                component = "mutator",
                op = "update_flag",
                note_id,
                field = flag.column(),
                value,
                "Status flag updated"
            );
            Ok(())
        } else {
            Err(Error::NoteNotFound(note_id))
        }
    }

    /// Apply each flag present in `update` as its own write, then return the
    /// note as stored.
    pub async fn update_status(&self, note_id: i64, update: StatusUpdate) -> Result<Note> {
        for (flag, value) in update.changes() {
            self.update_note_field(note_id, flag, value).await?;
        }
        self.notes
            .fetch(note_id)
            .await?
            .ok_or(Error::NoteNotFound(note_id))
    }

    /// Replace title and content, returning the updated note.
    pub async fn update_content(&self, note_id: i64, title: &str, content: &str) -> Result<Note> {
        if !self.notes.update_content(note_id, title, content).await? {
            return Err(Error::NoteNotFound(note_id));
        }
        self.notes
            .fetch(note_id)
            .await?
            .ok_or(Error::NoteNotFound(note_id))
    }
}
