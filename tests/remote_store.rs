use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use merlion::{CreateNoteRequest, CredentialStore, Credentials, ErrorKind, NoteStore, RemoteStore};

fn note(id: &str, title: &str) -> serde_json::Value {
    json!({
        "note_id": id,
        "title": title,
        "content": "text",
        "tags": ["t"],
        "is_favorite": true,
        "is_work_log": false,
        "is_trash": false,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn not_found_is_transport_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let remote = RemoteStore::new(&server.uri(), Some(Credentials::new("u@x", "p"))).unwrap();
    let err = remote.get("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn crud_goes_to_the_rest_surface() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"title": "New", "content": "text", "tags": ["t"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(note("n1", "New")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/notes/n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(note("n1", "Renamed")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/notes/n1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteStore::new(&server.uri(), Some(Credentials::new("u@x", "p"))).unwrap();
    let created = remote
        .create(&CreateNoteRequest::new("New").with_content("text").with_tags(["t"]))
        .await
        .unwrap();
    assert_eq!(created.note_id, "n1");

    let updated = remote
        .update("n1", &CreateNoteRequest::new("Renamed"))
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");

    remote.delete("n1").await.unwrap();
}

#[tokio::test]
async fn saved_credentials_drive_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .and(header("authorization", "Basic dUB4OnA="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let creds = Arc::new(CredentialStore::with_dir(dir.path()).unwrap());
    assert!(RemoteStore::from_credential_store(creds.clone(), &server.uri())
        .unwrap()
        .is_none());

    creds.save(&Credentials::new("u@x", "p")).unwrap();
    let remote = RemoteStore::from_credential_store(creds, &server.uri())
        .unwrap()
        .unwrap();
    assert!(remote.list().await.unwrap().is_empty());
}
