use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;

use fileshare_client::dashboard::{Dashboard, DashboardOptions};
use fileshare_client::notify::{ChannelSink, Level};
use fileshare_client::share::CommandClipboard;
use fileshare_client::transport::{
    Failure, FailureStatus, FileService, HttpFileService, InMemoryFileService,
};
use fileshare_client::{Credential, Session};

const TOKEN: &str = "secret";

/// Mock file service speaking the HTTP contract, backed by the in-memory service.
struct Mock {
    service: InMemoryFileService,
    upload_types: Mutex<Vec<String>>,
}

type Shared = Arc<Mock>;

fn bearer(headers: &HeaderMap) -> Credential {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    Credential::new(token)
}

fn reject(failure: Failure) -> Response {
    let status = match failure.status {
        FailureStatus::Http(code) => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "message": failure.message }))).into_response()
}

fn ack(result: Result<String, Failure>) -> Response {
    match result {
        Ok(message) => Json(json!({ "message": message })).into_response(),
        Err(failure) => reject(failure),
    }
}

async fn list_files(State(mock): State<Shared>, headers: HeaderMap) -> Response {
    match mock.service.list_files(&bearer(&headers)).await {
        Ok(files) => Json(files).into_response(),
        Err(failure) => reject(failure),
    }
}

async fn upload(State(mock): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    let mut file = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap_or_default();
        file = Some((filename, content_type, data));
    }

    let Some((filename, content_type, data)) = file else {
        return reject(Failure::http(400, "No file uploaded"));
    };
    mock.upload_types.lock().unwrap().push(content_type);
    ack(mock.service.upload_file(&bearer(&headers), data, &filename).await)
}

async fn toggle_privacy(
    State(mock): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    ack(mock.service.toggle_privacy(&bearer(&headers), &id).await)
}

async fn delete_file(
    State(mock): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    ack(mock.service.delete_file(&bearer(&headers), &id).await)
}

async fn fetch_shared(State(mock): State<Shared>, Path(share_id): Path<String>) -> Response {
    match mock.service.fetch_shared(&share_id).await {
        Ok(data) => data.into_response(),
        Err(failure) => reject(failure),
    }
}

fn mock_router(mock: Shared) -> Router {
    Router::new()
        .route("/api/files/files", get(list_files))
        .route("/api/files/upload", post(upload))
        .route("/api/files/files/:id/toggle-privacy", patch(toggle_privacy))
        .route("/api/files/files/:id", axum::routing::delete(delete_file))
        .route("/api/files/share/:share_id", get(fetch_shared))
        .with_state(mock)
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
}

async fn setup() -> (Shared, HttpFileService, Credential) {
    let mock = Arc::new(Mock {
        service: InMemoryFileService::default(),
        upload_types: Mutex::new(Vec::new()),
    });
    mock.service.authorize(TOKEN);
    let base = serve(mock_router(mock.clone())).await;
    let client = HttpFileService::new(&base, Duration::from_secs(5)).unwrap();
    (mock, client, Credential::new(TOKEN))
}

#[tokio::test]
async fn test_list_empty() {
    let (_mock, client, cred) = setup().await;
    assert!(client.list_files(&cred).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let (_mock, client, _cred) = setup().await;

    let failure = client
        .list_files(&Credential::new("wrong"))
        .await
        .unwrap_err();
    assert!(failure.is_unauthorized());
    assert_eq!(failure.message, "Invalid or expired token");
}

#[tokio::test]
async fn test_upload_sends_multipart_file() {
    let (mock, client, cred) = setup().await;

    let message = client
        .upload_file(&cred, Bytes::from("%PDF-1.4"), "report.pdf")
        .await
        .unwrap();
    assert_eq!(message, "File uploaded successfully");
    assert_eq!(
        mock.upload_types.lock().unwrap().as_slice(),
        ["application/pdf".to_string()]
    );

    let files = client.list_files(&cred).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "report.pdf");
    assert!(!files[0].is_public);
    assert_eq!(files[0].share_id, None);
}

#[tokio::test]
async fn test_toggle_and_fetch_shared_without_credential() {
    let (_mock, client, cred) = setup().await;
    client
        .upload_file(&cred, Bytes::from("hello"), "hello.txt")
        .await
        .unwrap();
    let id = client.list_files(&cred).await.unwrap()[0].id.clone();

    let message = client.toggle_privacy(&cred, &id).await.unwrap();
    assert_eq!(message, "File is now public");

    let record = client.list_files(&cred).await.unwrap()[0].clone();
    let share_id = record.share_id().expect("public record has share id").to_string();
    assert_eq!(
        client.fetch_shared(&share_id).await.unwrap(),
        Bytes::from("hello")
    );

    client.toggle_privacy(&cred, &id).await.unwrap();
    let failure = client.fetch_shared(&share_id).await.unwrap_err();
    assert_eq!(failure.status, FailureStatus::Http(404));
    assert_eq!(failure.message, "File not found or not public");
}

#[tokio::test]
async fn test_delete_unknown_file() {
    let (_mock, client, cred) = setup().await;

    let failure = client.delete_file(&cred, "ghost").await.unwrap_err();
    assert_eq!(failure, Failure::http(404, "File not found"));
}

#[tokio::test]
async fn test_rejection_without_message_uses_fallback() {
    let router = Router::new().route(
        "/api/files/files",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = serve(router).await;
    let client = HttpFileService::new(&base, Duration::from_secs(5)).unwrap();

    let failure = client
        .list_files(&Credential::new(TOKEN))
        .await
        .unwrap_err();
    assert_eq!(failure, Failure::http(500, "Failed to fetch files: 500"));
}

#[tokio::test]
async fn test_listing_accepts_both_field_spellings() {
    let router = Router::new().route(
        "/api/files/files",
        get(|| async {
            Json(json!([
                {
                    "_id": "a",
                    "filename": "a.png",
                    "fileURl": "https://cdn.test/a.png",
                    "isPublic": true,
                    "shareId": "s-a",
                    "createdAt": "2024-05-01T10:00:00Z"
                },
                {
                    "id": "b",
                    "filename": "b.txt",
                    "fileUrl": "https://cdn.test/b.txt",
                    "isPublic": false,
                    "createdAt": "2024-05-02T10:00:00Z"
                }
            ]))
        }),
    );
    let base = serve(router).await;
    let client = HttpFileService::new(&base, Duration::from_secs(5)).unwrap();

    let files = client.list_files(&Credential::new(TOKEN)).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].id, "a");
    assert_eq!(files[0].file_url, "https://cdn.test/a.png");
    assert_eq!(files[0].share_id(), Some("s-a"));
    assert_eq!(files[1].id, "b");
    assert_eq!(files[1].file_url, "https://cdn.test/b.txt");
    assert_eq!(files[1].share_id, None);
}

#[tokio::test]
async fn test_unreachable_service_is_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpFileService::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    let failure = client
        .list_files(&Credential::new(TOKEN))
        .await
        .unwrap_err();
    assert_eq!(failure.status, FailureStatus::Network);
}

#[tokio::test]
async fn test_dashboard_over_http() {
    let (_mock, client, cred) = setup().await;
    let base = client.base_url().to_string();
    let (sink, mut notifications) = ChannelSink::new();

    let dashboard = Dashboard::new(
        DashboardOptions {
            share_base: base.clone(),
            request_timeout: Duration::from_secs(5),
            max_upload_size: 1024 * 1024,
        },
        Arc::new(client),
        Arc::new(Session::in_memory(Some(cred))),
        Arc::new(sink),
        Arc::new(CommandClipboard::new("true").unwrap()),
    );

    dashboard.mount().await.unwrap();
    dashboard
        .upload("notes.md", Bytes::from("# notes"))
        .await
        .unwrap();
    let id = dashboard.files()[0].id.clone();
    dashboard.toggle_privacy(&id).await.unwrap();

    let record = dashboard.files()[0].clone();
    let share_id = record.share_id().unwrap();
    assert_eq!(
        dashboard.share_url(&id),
        Some(format!("{base}/api/files/share/{share_id}"))
    );

    let mut flow = dashboard.request_delete(&id).unwrap();
    dashboard.delete(flow.confirm().unwrap()).await.unwrap();
    assert!(dashboard.files().is_empty());

    let mut levels = Vec::new();
    while let Ok(n) = notifications.try_recv() {
        levels.push(n.level);
    }
    assert_eq!(levels, vec![Level::Success; 3]);
}
