//! Note repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use notable_core::{
    CollectionField, CollectionSnapshot, CreateNoteRequest, Error, Note, NoteFilter,
    NoteRepository, Result, StatusFlag,
};

/// Columns selected for a full note, in `map_row_to_note` order.
const NOTE_COLUMNS: &str = "id, user_id, title, content, tags, attachments, favorite, pinned, \
     in_trash, created_at, modified_at";

/// New `modified_at` for an update bound to `$ts`. Always moves forward so the
/// compare-and-swap token changes even when two writes land in the same tick.
fn bump_modified_at(ts_param: &str) -> String {
    format!(
        "modified_at = GREATEST({}, modified_at + interval '1 microsecond')",
        ts_param
    )
}

/// Map a database row to a Note.
fn map_row_to_note(row: &PgRow) -> Note {
    let tags: Json<Vec<String>> = row.get("tags");
    let attachments: Json<Vec<String>> = row.get("attachments");
    Note {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        tags: tags.0,
        attachments: attachments.0,
        favorite: row.get("favorite"),
        pinned: row.get("pinned"),
        in_trash: row.get("in_trash"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    }
}

/// PostgreSQL implementation of NoteRepository.
///
/// `tags` and `attachments` are JSONB arrays embedded in the `notes` row.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO notes (user_id, title, content, tags, attachments, favorite, pinned, \
             in_trash, created_at, modified_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING {}",
            NOTE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(req.user_id)
            .bind(&req.title)
            .bind(&req.content)
            .bind(Json(&req.tags))
            .bind(Json(&req.attachments))
            .bind(req.favorite)
            .bind(req.pinned)
            .bind(req.in_trash)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let note = map_row_to_note(&row);
        debug!(
            subsystem = "db",
            component = "notes",
            op = "insert",
            note_id = note.id,
            user_id = note.user_id,
            "Note inserted"
        );
        Ok(note)
    }

    async fn fetch(&self, id: i64) -> Result<Option<Note>> {
        let query = format!("SELECT {} FROM notes WHERE id = $1", NOTE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(map_row_to_note))
    }

    async fn list_all(&self) -> Result<Vec<Note>> {
        let query = format!("SELECT {} FROM notes ORDER BY id", NOTE_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(map_row_to_note).collect())
    }

    async fn list_for_user(&self, user_id: i64, filter: NoteFilter) -> Result<Vec<Note>> {
        let query = format!(
            "SELECT {} FROM notes WHERE user_id = $1 {} ORDER BY id",
            NOTE_COLUMNS,
            filter.sql_predicate()
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "notes",
            op = "list_for_user",
            user_id,
            filter = ?filter,
            result_count = rows.len(),
            "Listed notes"
        );
        Ok(rows.iter().map(map_row_to_note).collect())
    }

    async fn distinct_tags(&self, user_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT t.tag
             FROM notes n
             CROSS JOIN LATERAL jsonb_array_elements_text(n.tags) AS t(tag)
             WHERE n.user_id = $1
             ORDER BY t.tag",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(|r| r.get::<String, _>("tag")).collect())
    }

    async fn update_content(&self, id: i64, title: &str, content: &str) -> Result<bool> {
        let query = format!(
            "UPDATE notes SET title = $1, content = $2, {} WHERE id = $4",
            bump_modified_at("$3")
        );
        let result = sqlx::query(&query)
            .bind(title)
            .bind(content)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_flag(&self, id: i64, flag: StatusFlag, value: bool) -> Result<bool> {
        // Column names come from the StatusFlag enum, never from input.
        let query = format!(
            "UPDATE notes SET {} = $1, {} WHERE id = $3",
            flag.column(),
            bump_modified_at("$2")
        );
        let result = sqlx::query(&query)
            .bind(value)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn read_collection(
        &self,
        id: i64,
        field: CollectionField,
    ) -> Result<Option<CollectionSnapshot>> {
        let query = format!(
            "SELECT {} AS items, modified_at FROM notes WHERE id = $1",
            field.column()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| {
            let items: Json<Vec<String>> = r.get("items");
            CollectionSnapshot {
                values: items.0,
                modified_at: r.get("modified_at"),
            }
        }))
    }

    async fn write_collection(
        &self,
        id: i64,
        field: CollectionField,
        values: &[String],
        expected_modified_at: DateTime<Utc>,
    ) -> Result<bool> {
        let query = format!(
            "UPDATE notes SET {} = $1, {} WHERE id = $3 AND modified_at = $4",
            field.column(),
            bump_modified_at("$2")
        );
        let result = sqlx::query(&query)
            .bind(Json(values))
            .bind(Utc::now())
            .bind(id)
            .bind(expected_modified_at)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() == 1)
    }

    async fn hard_delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "notes",
            op = "hard_delete",
            note_id = id,
            rows = result.rows_affected(),
            "Note delete executed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_modified_at_moves_forward() {
        let clause = bump_modified_at("$2");
        assert_eq!(
            clause,
            "modified_at = GREATEST($2, modified_at + interval '1 microsecond')"
        );
    }

    #[test]
    fn test_note_columns_cover_model() {
        for column in [
            "id",
            "user_id",
            "title",
            "content",
            "tags",
            "attachments",
            "favorite",
            "pinned",
            "in_trash",
            "created_at",
            "modified_at",
        ] {
            assert!(NOTE_COLUMNS.contains(column), "missing column {}", column);
        }
    }
}
