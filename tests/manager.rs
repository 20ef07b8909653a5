use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use merlion::{
    CreateNoteRequest, Credentials, FileStore, NoteStore, PermanentDelete, RemoteStore,
    SqlStore, StoreKind, StoreManager,
};

fn sql_store(dir: &tempfile::TempDir) -> Box<dyn NoteStore> {
    Box::new(SqlStore::open(&dir.path().join("notes.db")).unwrap())
}

fn file_store(dir: &tempfile::TempDir) -> Box<dyn NoteStore> {
    Box::new(
        FileStore::new(dir.path().to_str().unwrap(), Some("Vault"))
            .unwrap()
            .with_trash(PermanentDelete),
    )
}

#[tokio::test]
#[should_panic(expected = "invariant violation")]
async fn switching_without_listing_traps() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let mut manager = StoreManager::new(vec![sql_store(&a), file_store(&b)]).unwrap();

    manager.list().await.unwrap();
    let note = manager.create(&CreateNoteRequest::new("In A")).await.unwrap();

    manager.next_store();
    assert_eq!(manager.active_kind(), StoreKind::File);
    let _ = manager.get_full(&note.note_id).await;
}

#[tokio::test]
async fn listing_after_switch_restores_access() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let mut manager = StoreManager::new(vec![sql_store(&a), file_store(&b)]).unwrap();

    manager.list().await.unwrap();
    let in_sql = manager
        .create(&CreateNoteRequest::new("Alpha").with_content("sql body"))
        .await
        .unwrap();
    assert!(manager.notes()[0].content.is_some());

    manager.next_store();
    assert!(manager.list().await.unwrap().is_empty());
    assert!(manager.search_by_id(&in_sql.note_id).is_none());

    manager.next_store();
    let listed = manager.list().await.unwrap();
    assert!(listed[0].content.is_none());
    let full = manager.get_full(&in_sql.note_id).await.unwrap();
    assert_eq!(full.content.as_deref(), Some("sql body"));
    assert_eq!(
        manager.search_by_id(&in_sql.note_id).unwrap().content.as_deref(),
        Some("sql body")
    );
}

#[tokio::test]
async fn replace_remote_appends_and_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "note_id": "r1",
            "title": "From the cloud",
            "content": null,
            "tags": ["Remote"],
            "is_favorite": false,
            "is_work_log": false,
            "is_trash": false,
            "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "2024-03-01T12:00:00Z"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let a = tempfile::tempdir().unwrap();
    let mut manager = StoreManager::new(vec![file_store(&a)]).unwrap();
    manager.list().await.unwrap();

    let remote = RemoteStore::new(&server.uri(), Some(Credentials::new("u@x", "p"))).unwrap();
    manager.replace_remote(remote).await.unwrap();

    assert_eq!(manager.active_kind(), StoreKind::Remote);
    assert_eq!(manager.active_name(), "Cloud");
    assert_eq!(manager.store_names(), vec!["Vault", "Cloud"]);
    assert_eq!(manager.tags(), vec!["remote"]);
    assert!(manager.search_by_title("from the cloud").is_some());
}
