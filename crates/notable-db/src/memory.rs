//! In-memory repositories for tests and local runs without PostgreSQL.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use notable_core::{
    CollectionField, CollectionSnapshot, CreateNoteRequest, Error, NewUser, Note, NoteFilter,
    NoteRepository, Result, StatusFlag, User, UserRepository,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Next `modified_at` after `previous`; strictly increasing per row.
fn next_modified_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous + Duration::microseconds(1))
}

#[derive(Debug, Default)]
struct NoteTable {
    next_id: i64,
    rows: BTreeMap<i64, Note>,
}

/// In-memory NoteRepository.
#[derive(Clone, Debug, Default)]
pub struct MemoryNoteRepository {
    inner: Arc<Mutex<NoteTable>>,
}

impl MemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteRepository for MemoryNoteRepository {
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note> {
        let mut table = lock(&self.inner);
        table.next_id += 1;
        let now = Utc::now();
        let note = Note {
            id: table.next_id,
            user_id: req.user_id,
            title: req.title,
            content: req.content,
            tags: req.tags,
            attachments: req.attachments,
            favorite: req.favorite,
            pinned: req.pinned,
            in_trash: req.in_trash,
            created_at: now,
            modified_at: now,
        };
        table.rows.insert(note.id, note.clone());
        Ok(note)
    }

    async fn fetch(&self, id: i64) -> Result<Option<Note>> {
        Ok(lock(&self.inner).rows.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Note>> {
        Ok(lock(&self.inner).rows.values().cloned().collect())
    }

    async fn list_for_user(&self, user_id: i64, filter: NoteFilter) -> Result<Vec<Note>> {
        Ok(lock(&self.inner)
            .rows
            .values()
            .filter(|n| n.user_id == user_id && filter.matches(n))
            .cloned()
            .collect())
    }

    async fn distinct_tags(&self, user_id: i64) -> Result<Vec<String>> {
        let table = lock(&self.inner);
        let tags: BTreeSet<&String> = table
            .rows
            .values()
            .filter(|n| n.user_id == user_id)
            .flat_map(|n| n.tags.iter())
            .collect();
        Ok(tags.into_iter().cloned().collect())
    }

    async fn update_content(&self, id: i64, title: &str, content: &str) -> Result<bool> {
        let mut table = lock(&self.inner);
        let Some(note) = table.rows.get_mut(&id) else {
            return Ok(false);
        };
        note.title = title.to_string();
        note.content = content.to_string();
        note.modified_at = next_modified_at(note.modified_at);
        Ok(true)
    }

    async fn update_flag(&self, id: i64, flag: StatusFlag, value: bool) -> Result<bool> {
        let mut table = lock(&self.inner);
        let Some(note) = table.rows.get_mut(&id) else {
            return Ok(false);
        };
        match flag {
            StatusFlag::Favorite => note.favorite = value,
            StatusFlag::Pinned => note.pinned = value,
            StatusFlag::InTrash => note.in_trash = value,
        }
        note.modified_at = next_modified_at(note.modified_at);
        Ok(true)
    }

    async fn read_collection(
        &self,
        id: i64,
        field: CollectionField,
    ) -> Result<Option<CollectionSnapshot>> {
        Ok(lock(&self.inner).rows.get(&id).map(|n| CollectionSnapshot {
            values: n.collection(field).to_vec(),
            modified_at: n.modified_at,
        }))
    }

    async fn write_collection(
        &self,
        id: i64,
        field: CollectionField,
        values: &[String],
        expected_modified_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut table = lock(&self.inner);
        let Some(note) = table.rows.get_mut(&id) else {
            return Ok(false);
        };
        if note.modified_at != expected_modified_at {
            return Ok(false);
        }
        match field {
            CollectionField::Tags => note.tags = values.to_vec(),
            CollectionField::Attachments => note.attachments = values.to_vec(),
        }
        note.modified_at = next_modified_at(note.modified_at);
        Ok(true)
    }

    async fn hard_delete(&self, id: i64) -> Result<()> {
        lock(&self.inner).rows.remove(&id);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct UserTable {
    next_id: i64,
    rows: HashMap<i64, User>,
}

/// In-memory UserRepository. Enforces unique email and provider uid.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserRepository {
    inner: Arc<Mutex<UserTable>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut table = lock(&self.inner);
        if table.rows.values().any(|u| u.email == user.email) {
            return Err(Error::Conflict(format!(
                "user with email {} already exists",
                user.email
            )));
        }
        if let Some(uid) = &user.provider_uid {
            if table
                .rows
                .values()
                .any(|u| u.provider_uid.as_deref() == Some(uid.as_str()))
            {
                return Err(Error::Conflict(format!(
                    "user with provider uid {} already exists",
                    uid
                )));
            }
        }

        table.next_id += 1;
        let row = User {
            id: table.next_id,
            email: user.email,
            username: user.username,
            phone_number: user.phone_number,
            provider_uid: user.provider_uid,
            created_at: Utc::now(),
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(lock(&self.inner)
            .rows
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_provider_uid(&self, uid: &str) -> Result<Option<User>> {
        Ok(lock(&self.inner)
            .rows
            .values()
            .find(|u| u.provider_uid.as_deref() == Some(uid))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_for(user_id: i64, title: &str) -> CreateNoteRequest {
        CreateNoteRequest {
            user_id,
            title: title.to_string(),
            content: "body".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_defaults() {
        let repo = MemoryNoteRepository::new();
        let a = repo.insert(note_for(1, "a")).await.unwrap();
        let b = repo.insert(note_for(1, "b")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(a.tags.is_empty());
        assert!(!a.favorite && !a.pinned && !a.in_trash);
        assert_eq!(a.created_at, a.modified_at);
    }

    #[tokio::test]
    async fn test_list_for_user_applies_filter() {
        let repo = MemoryNoteRepository::new();
        let tagged = repo
            .insert(CreateNoteRequest {
                tags: vec!["work".into()],
                ..note_for(1, "tagged")
            })
            .await
            .unwrap();
        let fav = repo
            .insert(CreateNoteRequest {
                favorite: true,
                ..note_for(1, "fav")
            })
            .await
            .unwrap();
        repo.insert(note_for(2, "other user")).await.unwrap();

        let all = repo.list_for_user(1, NoteFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);

        let tagged_only = repo.list_for_user(1, NoteFilter::Tagged).await.unwrap();
        assert_eq!(tagged_only, vec![tagged]);

        let untagged = repo.list_for_user(1, NoteFilter::Untagged).await.unwrap();
        assert_eq!(untagged.len(), 1);
        assert_eq!(untagged[0].id, fav.id);

        let favorites = repo.list_for_user(1, NoteFilter::Favorites).await.unwrap();
        assert_eq!(favorites[0].id, fav.id);

        assert!(repo
            .list_for_user(1, NoteFilter::Trash)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_distinct_tags_sorted_and_scoped_to_user() {
        let repo = MemoryNoteRepository::new();
        repo.insert(CreateNoteRequest {
            tags: vec!["zeta".into(), "alpha".into(), "zeta".into()],
            ..note_for(1, "a")
        })
        .await
        .unwrap();
        repo.insert(CreateNoteRequest {
            tags: vec!["beta".into()],
            ..note_for(1, "b")
        })
        .await
        .unwrap();
        repo.insert(CreateNoteRequest {
            tags: vec!["hidden".into()],
            ..note_for(2, "c")
        })
        .await
        .unwrap();

        let tags = repo.distinct_tags(1).await.unwrap();
        assert_eq!(tags, vec!["alpha", "beta", "zeta"]);
    }

    #[tokio::test]
    async fn test_write_collection_rejects_stale_token() {
        let repo = MemoryNoteRepository::new();
        let note = repo.insert(note_for(1, "n")).await.unwrap();
        let snapshot = repo
            .read_collection(note.id, CollectionField::Tags)
            .await
            .unwrap()
            .unwrap();

        let ok = repo
            .write_collection(
                note.id,
                CollectionField::Tags,
                &["a".to_string()],
                snapshot.modified_at,
            )
            .await
            .unwrap();
        assert!(ok);

        // Same token again is now stale.
        let stale = repo
            .write_collection(
                note.id,
                CollectionField::Tags,
                &["b".to_string()],
                snapshot.modified_at,
            )
            .await
            .unwrap();
        assert!(!stale);

        let stored = repo.fetch(note.id).await.unwrap().unwrap();
        assert_eq!(stored.tags, vec!["a"]);
        assert!(stored.modified_at > note.modified_at);
    }

    #[tokio::test]
    async fn test_update_on_missing_note_reports_false() {
        let repo = MemoryNoteRepository::new();
        assert!(!repo.update_content(42, "t", "c").await.unwrap());
        assert!(!repo
            .update_flag(42, StatusFlag::Pinned, true)
            .await
            .unwrap());
        assert!(repo
            .read_collection(42, CollectionField::Attachments)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_hard_delete_missing_is_ok() {
        let repo = MemoryNoteRepository::new();
        repo.hard_delete(999).await.unwrap();
    }

    #[tokio::test]
    async fn test_user_email_is_unique() {
        let repo = MemoryUserRepository::new();
        let user = NewUser {
            email: "a@example.com".into(),
            username: "a".into(),
            phone_number: None,
            provider_uid: Some("uid-a".into()),
        };
        let stored = repo.insert(user.clone()).await.unwrap();
        assert_eq!(stored.id, 1);

        let err = repo.insert(user).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let by_uid = repo.find_by_provider_uid("uid-a").await.unwrap().unwrap();
        assert_eq!(by_uid.email, "a@example.com");
        assert!(repo.find_by_email("b@example.com").await.unwrap().is_none());
    }
}
