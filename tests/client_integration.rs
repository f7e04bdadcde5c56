//! Purpose: End-to-end tests for the transport pipeline against a loopback server.
//! Exports: None (integration test module).
//! Role: Validate bearer attachment, envelope unwrapping, error classification, uploads.
//! Invariants: Uses loopback-only servers; every failure expects exactly one notice.
//! Invariants: Bounded timeouts avoid test flakiness.

mod support;

use axum::Json;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Write;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use support::{TestServer, err_envelope, ok_envelope};
use yuyu::api::{ApiClient, ErrorKind, SortBy};
use yuyu::core::credentials::CredentialFile;
use yuyu::core::session::SessionStore;
use yuyu::notice::MemoryNotices;

fn client_for(base_url: &str, session: SessionStore, notices: &Arc<MemoryNotices>) -> ApiClient {
    let sink: Arc<MemoryNotices> = Arc::clone(notices);
    ApiClient::new(base_url, session)
        .expect("client")
        .with_notice_sink(sink)
}

fn profile_json() -> Value {
    json!({
        "id": 1,
        "username": "alice",
        "nickname": "Alice",
        "fishBalance": 12,
        "canClaimDaily": true
    })
}

#[test]
fn login_then_bearer_flows_to_me() {
    let app = axum::Router::new()
        .route(
            "/api/users/login",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["username"], "alice");
                assert_eq!(body["password"], "secret");
                Json(ok_envelope(json!({ "token": "tok-1" })))
            }),
        )
        .route(
            "/api/users/me",
            get(|headers: HeaderMap| async move {
                let authorization = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if authorization == "Bearer tok-1" {
                    Json(ok_envelope(profile_json()))
                } else {
                    Json(err_envelope(401, "unauthorized"))
                }
            }),
        );
    let server = TestServer::start(app);
    let notices = Arc::new(MemoryNotices::new());
    let session = SessionStore::in_memory();
    let client = client_for(&server.base_url(), session, &notices);

    // Without a credential the envelope rejects and one notice surfaces.
    let err = client.users().me().expect_err("err");
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.message(), Some("unauthorized"));
    let recorded = notices.take();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].message, "unauthorized");

    let login = client.users().login("alice", "secret").expect("login");
    client.session().set_token(login.token).expect("set token");
    assert!(client.session().is_logged_in());

    let profile = client.users().me().expect("me");
    assert_eq!(profile.username.as_deref(), Some("alice"));
    assert_eq!(profile.fish_balance, 12);
    assert!(profile.can_claim_daily);
    assert!(notices.is_empty(), "successful requests emit no notices");
}

#[test]
fn business_failure_surfaces_once_and_rejects() {
    let app = axum::Router::new().route(
        "/api/users/register",
        post(|| async { Json(err_envelope(40001, "username taken")) }),
    );
    let server = TestServer::start(app);
    let notices = Arc::new(MemoryNotices::new());
    let client = client_for(&server.base_url(), SessionStore::in_memory(), &notices);

    let request = yuyu::api::RegisterRequest {
        username: "alice".to_string(),
        password: "secret".to_string(),
        email: "alice@example.com".to_string(),
        verification_code: "123456".to_string(),
    };
    let err = client.users().register(&request).expect_err("err");
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.code(), Some(40001));
    assert_eq!(err.message(), Some("username taken"));

    let recorded = notices.take();
    assert_eq!(recorded.len(), 1, "exactly one notice per failure");
    assert_eq!(recorded[0].message, "username taken");
}

#[test]
fn timeout_yields_canned_message() {
    let app = axum::Router::new().route(
        "/api/notifications",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Json(ok_envelope(json!([])))
        }),
    );
    let server = TestServer::start(app);
    let notices = Arc::new(MemoryNotices::new());
    let client = client_for(&server.base_url(), SessionStore::in_memory(), &notices)
        .with_timeout(Duration::from_millis(60));

    let err = client.notifications().list().expect_err("err");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(
        err.message(),
        Some("request timed out, check your network connection")
    );
    let recorded = notices.take();
    assert_eq!(recorded.len(), 1);
    assert_eq!(
        recorded[0].message,
        "request timed out, check your network connection"
    );
}

#[test]
fn connection_refused_is_a_network_error() {
    // Grab a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let notices = Arc::new(MemoryNotices::new());
    let client = client_for(
        &format!("http://{addr}/api"),
        SessionStore::in_memory(),
        &notices,
    );

    let err = client.videos().detail(1).expect_err("err");
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(
        err.message(),
        Some("network error, check your network connection")
    );
    assert_eq!(notices.len(), 1);
}

#[test]
fn http_error_prefers_server_message() {
    let app = axum::Router::new()
        .route(
            "/api/videos/1",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(err_envelope(500, "database exploded")),
                )
            }),
        )
        .route(
            "/api/videos/2",
            get(|| async { (StatusCode::NOT_FOUND, "plain text") }),
        );
    let server = TestServer::start(app);
    let notices = Arc::new(MemoryNotices::new());
    let client = client_for(&server.base_url(), SessionStore::in_memory(), &notices);

    let err = client.videos().detail(1).expect_err("err");
    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.message(), Some("database exploded"));

    let err = client.videos().detail(2).expect_err("err");
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.message(), Some("request failed with http status 404"));

    assert_eq!(notices.len(), 2);
}

#[test]
fn list_query_parameters_reach_the_server() {
    let app = axum::Router::new().route(
        "/api/videos",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            assert_eq!(query.get("page").map(String::as_str), Some("2"));
            assert_eq!(query.get("size").map(String::as_str), Some("5"));
            assert_eq!(query.get("sortBy").map(String::as_str), Some("views"));
            Json(ok_envelope(json!({
                "items": [{ "id": 7, "title": "carp compilation", "views": 100 }],
                "page": 2,
                "size": 5,
                "total": 11
            })))
        }),
    );
    let server = TestServer::start(app);
    let notices = Arc::new(MemoryNotices::new());
    let client = client_for(&server.base_url(), SessionStore::in_memory(), &notices);

    let page = client.videos().list(2, 5, SortBy::Views).expect("list");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "carp compilation");
    assert_eq!(page.total, 11);
}

#[test]
fn upload_streams_multipart_and_reports_progress() {
    let received: Arc<Mutex<Option<(String, Vec<u8>)>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&received);
    let app = axum::Router::new().route(
        "/api/videos/upload",
        post(move |headers: HeaderMap, body: Bytes| {
            let sink = Arc::clone(&sink);
            async move {
                let content_type = headers
                    .get("content-type")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *sink.lock().expect("lock") = Some((content_type, body.to_vec()));
                Json(ok_envelope(json!({ "id": 99, "title": "first catch" })))
            }
        }),
    );
    let server = TestServer::start(app);

    let dir = tempfile::tempdir().expect("tempdir");
    let video_path = dir.path().join("clip.mp4");
    let cover_path = dir.path().join("cover.png");
    std::fs::File::create(&video_path)
        .expect("create")
        .write_all(&[42u8; 8192])
        .expect("write");
    std::fs::File::create(&cover_path)
        .expect("create")
        .write_all(b"PNGDATA")
        .expect("write");

    let notices = Arc::new(MemoryNotices::new());
    let client = client_for(&server.base_url(), SessionStore::in_memory(), &notices);

    let reports: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let progress_sink = Arc::clone(&reports);
    let request = yuyu::api::UploadRequest {
        title: "first catch".to_string(),
        description: "a carp".to_string(),
        file: video_path,
        cover: cover_path,
    };
    let video = client
        .videos()
        .upload(
            &request,
            Some(Box::new(move |sent, total| {
                progress_sink.lock().expect("lock").push((sent, total));
            })),
        )
        .expect("upload");
    assert_eq!(video.id, 99);

    let (content_type, body) = received.lock().expect("lock").take().expect("received");
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("name=\"title\""));
    assert!(text.contains("filename=\"clip.mp4\""));
    assert!(text.contains("filename=\"cover.png\""));
    assert!(text.contains("PNGDATA"));

    let reports = reports.lock().expect("lock");
    let (sent, total) = reports.last().expect("progress");
    assert_eq!(sent, total, "progress ends at the declared total");
    assert_eq!(*total as usize, body.len(), "server saw exactly the declared body");
}

#[test]
fn credential_survives_a_new_client() {
    let app = axum::Router::new().route(
        "/api/users/me",
        get(|headers: HeaderMap| async move {
            let authorization = headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if authorization == "Bearer tok-keep" {
                Json(ok_envelope(profile_json()))
            } else {
                Json(err_envelope(401, "unauthorized"))
            }
        }),
    );
    let server = TestServer::start(app);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("credential");
    let notices = Arc::new(MemoryNotices::new());

    let session = SessionStore::load(CredentialFile::new(&path)).expect("load");
    session.set_token("tok-keep").expect("set token");
    drop(session);

    let restored = SessionStore::load(CredentialFile::new(&path)).expect("reload");
    let client = client_for(&server.base_url(), restored, &notices);
    let profile = client.users().me().expect("me");
    assert_eq!(profile.username.as_deref(), Some("alice"));

    client.session().logout().expect("logout");
    let cleared = SessionStore::load(CredentialFile::new(&path)).expect("reload");
    assert!(!cleared.is_logged_in());
}
