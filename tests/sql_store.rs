use std::{collections::BTreeSet, time::Duration};

use merlion::stores::{migrations, Migration, EMBEDDED_MIGRATIONS};
use merlion::{CreateNoteRequest, ErrorKind, NoteStore, SqlStore, StoreKind};

fn open_temp() -> (tempfile::TempDir, SqlStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlStore::open(&dir.path().join("notes.db")).unwrap();
    (dir, store)
}

fn alpha() -> CreateNoteRequest {
    CreateNoteRequest::new("Alpha")
        .with_content("hello")
        .with_tags(["a", "B"])
        .favorite(true)
}

#[tokio::test]
async fn create_and_fetch() {
    let (_dir, store) = open_temp();
    assert_eq!(store.kind(), StoreKind::Sql);

    let created = store.create(&alpha()).await.unwrap();
    assert!(uuid::Uuid::parse_str(&created.note_id).is_ok());
    assert!(!created.is_trash);
    assert!(created.is_favorite);
    assert_eq!(created.created_at, created.updated_at);

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Alpha");

    let fetched = store.get(&created.note_id).await.unwrap();
    assert_eq!(fetched.content.as_deref(), Some("hello"));
    assert_eq!(
        fetched.tag_set(),
        BTreeSet::from(["a".to_string(), "B".to_string()])
    );
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn update_preserves_created_at() {
    let (_dir, store) = open_temp();
    let created = store.create(&alpha()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let updated = store
        .update(&created.note_id, &CreateNoteRequest::new("Alpha2"))
        .await
        .unwrap();

    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.tags.is_empty());

    let fetched = store.get(&created.note_id).await.unwrap();
    assert_eq!(fetched, updated);
    assert_eq!(fetched.title, "Alpha2");
    assert_eq!(fetched.content.as_deref(), Some("hello"));
    assert!(fetched.is_favorite);
}

#[tokio::test]
async fn missing_notes_are_not_found() {
    let (_dir, store) = open_temp();
    let err = store.get("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = store
        .update("nope", &CreateNoteRequest::new("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn reopening_keeps_notes_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.db");
    let id = {
        let store = SqlStore::open(&path).unwrap();
        store.create(&alpha()).await.unwrap().note_id
    };

    let store = SqlStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), 2);
    assert_eq!(store.get(&id).await.unwrap().title, "Alpha");
}

#[test]
fn migrations_apply_once_and_never_roll_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("migrate.db");

    let mut conn = rusqlite::Connection::open(&path).unwrap();
    assert_eq!(migrations::apply_migrations(&mut conn, EMBEDDED_MIGRATIONS).unwrap(), 2);
    assert_eq!(migrations::current_version(&conn).unwrap(), 2);
    assert_eq!(migrations::apply_migrations(&mut conn, EMBEDDED_MIGRATIONS).unwrap(), 0);

    let mut extended = EMBEDDED_MIGRATIONS.to_vec();
    extended.push(Migration {
        file_name: "003__add_pinned.sql",
        sql: "ALTER TABLE notes ADD COLUMN pinned BOOLEAN NOT NULL DEFAULT 0;",
    });
    assert_eq!(migrations::apply_migrations(&mut conn, &extended).unwrap(), 1);
    assert_eq!(migrations::current_version(&conn).unwrap(), 3);

    // Dropping 002 from the list does not undo it.
    let without_second = [extended[0], extended[2]];
    assert_eq!(migrations::apply_migrations(&mut conn, &without_second).unwrap(), 0);
    assert_eq!(migrations::current_version(&conn).unwrap(), 3);
    drop(conn);

    let store = SqlStore::open_with_migrations(&path, &extended).unwrap();
    assert_eq!(store.schema_version().unwrap(), 3);
}

#[test]
fn badly_named_migration_aborts_open() {
    let dir = tempfile::tempdir().unwrap();
    let bad = [Migration {
        file_name: "init.sql",
        sql: "CREATE TABLE x (id INTEGER);",
    }];
    assert!(SqlStore::open_with_migrations(&dir.path().join("bad.db"), &bad).is_err());
}
