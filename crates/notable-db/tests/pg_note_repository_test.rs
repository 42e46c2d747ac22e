//! PostgreSQL-backed repository tests.
//!
//! Require a migrated database at `DATABASE_URL` (or the default test URL):
//! `cargo test -p notable-db -- --ignored`

use std::sync::Arc;

use notable_db::test_fixtures::TestDatabase;
use notable_db::{
    CollectionField, Error, NoteFilter, NoteMutator, NoteRepository, StatusFlag, StatusUpdate,
    UserRepository,
};

async fn test_db() -> TestDatabase {
    dotenvy::dotenv().ok();
    TestDatabase::new().await
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_insert_and_fetch_round_trip() {
    let db = test_db().await;
    let user = db.create_user().await;
    let note = db.create_note(user.id, "First").await;

    assert!(note.tags.is_empty());
    assert!(note.attachments.is_empty());
    assert!(!note.favorite && !note.pinned && !note.in_trash);

    let fetched = db.notes.fetch(note.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "First");
    assert_eq!(fetched.user_id, user.id);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_filters_and_distinct_tags() {
    let db = test_db().await;
    let user = db.create_user().await;
    let a = db.create_note(user.id, "a").await;
    let b = db.create_note(user.id, "b").await;

    let mutator = NoteMutator::new(Arc::new(db.notes.clone()));
    mutator.add_tag(a.id, "work").await.unwrap();
    mutator.add_tag(a.id, "alpha").await.unwrap();
    mutator.add_tag(a.id, "work").await.unwrap();
    mutator
        .update_note_field(b.id, StatusFlag::Favorite, true)
        .await
        .unwrap();

    let tagged = db.notes.list_for_user(user.id, NoteFilter::Tagged).await.unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].tags, vec!["work", "alpha", "work"]);

    let untagged = db
        .notes
        .list_for_user(user.id, NoteFilter::Untagged)
        .await
        .unwrap();
    assert_eq!(untagged[0].id, b.id);

    let favorites = db
        .notes
        .list_for_user(user.id, NoteFilter::Favorites)
        .await
        .unwrap();
    assert_eq!(favorites[0].id, b.id);

    let tags = db.notes.distinct_tags(user.id).await.unwrap();
    assert_eq!(tags, vec!["alpha", "work"]);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_conditional_write_detects_concurrent_change() {
    let db = test_db().await;
    let user = db.create_user().await;
    let note = db.create_note(user.id, "cas").await;

    let snapshot = db
        .notes
        .read_collection(note.id, CollectionField::Attachments)
        .await
        .unwrap()
        .unwrap();

    // A status write in between moves modified_at forward.
    db.notes
        .update_flag(note.id, StatusFlag::Pinned, true)
        .await
        .unwrap();

    let written = db
        .notes
        .write_collection(
            note.id,
            CollectionField::Attachments,
            &["file.pdf".to_string()],
            snapshot.modified_at,
        )
        .await
        .unwrap();
    assert!(!written);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_adds_through_mutator_all_persist() {
    let db = test_db().await;
    let user = db.create_user().await;
    let note = db.create_note(user.id, "race").await;
    let mutator = NoteMutator::new(Arc::new(db.notes.clone()));

    let (x, y) = tokio::join!(mutator.add_tag(note.id, "x"), mutator.add_tag(note.id, "y"));
    x.unwrap();
    y.unwrap();

    let stored = db.notes.fetch(note.id).await.unwrap().unwrap();
    assert_eq!(stored.tags.len(), 2);
    assert!(stored.tags.contains(&"x".to_string()));
    assert!(stored.tags.contains(&"y".to_string()));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_status_update_and_delete() {
    let db = test_db().await;
    let user = db.create_user().await;
    let note = db.create_note(user.id, "status").await;
    let mutator = NoteMutator::new(Arc::new(db.notes.clone()));

    let updated = mutator
        .update_status(
            note.id,
            StatusUpdate {
                in_trash: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.in_trash);
    assert!(!updated.favorite);
    assert!(updated.modified_at > note.modified_at);

    db.notes.hard_delete(note.id).await.unwrap();
    db.notes.hard_delete(note.id).await.unwrap();
    assert!(db.notes.fetch(note.id).await.unwrap().is_none());

    let err = mutator.add_tag(note.id, "gone").await.unwrap_err();
    assert!(matches!(err, Error::NoteNotFound(_)));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_user_lookup_by_email_and_provider_uid() {
    let db = test_db().await;
    let user = db.create_user().await;

    let by_email = db.users.find_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);

    let uid = user.provider_uid.clone().unwrap();
    let by_uid = db.users.find_by_provider_uid(&uid).await.unwrap().unwrap();
    assert_eq!(by_uid.id, user.id);

    assert!(db
        .users
        .find_by_email("nobody@test.notable")
        .await
        .unwrap()
        .is_none());

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_user_with_notes_is_not_deleted_implicitly() {
    let db = test_db().await;
    let user = db.create_user().await;
    let note = db.create_note(user.id, "Kept").await;

    let err = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&db.pool)
        .await
        .unwrap_err();
    assert!(err
        .as_database_error()
        .is_some_and(|e| e.is_foreign_key_violation()));
    assert!(db.notes.fetch(note.id).await.unwrap().is_some());

    db.cleanup().await;
    assert!(db_fetch_gone(note.id).await);
}

async fn db_fetch_gone(note_id: i64) -> bool {
    let db = test_db().await;
    db.notes.fetch(note_id).await.unwrap().is_none()
}
