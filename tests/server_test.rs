mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use std::time::Duration;
use survey_etl::server::{router, AppState};
use survey_etl::{EtlEngine, LocalStorage, LocalWarehouse, SurveyPipeline};
use tempfile::TempDir;
use tower::ServiceExt;

fn app(dir: &TempDir, dedup_window: Duration) -> Router {
    let storage = LocalStorage::new(dir.path().join("objects"));
    let warehouse = LocalWarehouse::new(dir.path().join("warehouse"));
    let engine = EtlEngine::new(storage, SurveyPipeline::new(warehouse, TestConfig));
    router(AppState::new(engine, dedup_window))
}

async fn send(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn event(bucket: &str, name: &str) -> String {
    serde_json::json!({
        "bucket": bucket,
        "name": name,
        "eventType": "google.cloud.storage.object.v1.finalized"
    })
    .to_string()
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::from_secs(60));

    let (status, body) = send(&app, "GET", "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_rejects_missing_payload() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::from_secs(60));

    for body in ["", "not json", "null", "{}", "[]"] {
        let (status, text) = send(&app, "POST", "/", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {:?}", body);
        assert_eq!(text, "Bad Request: no JSON payload");
    }

    let (status, text) = send(&app, "POST", "/", r#"{"bucket": "uploads", "name": ""}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Bad Request: missing file information");

    let (status, text) = send(&app, "POST", "/", r#"{"name": "a.zip"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Bad Request: missing file information");
}

#[tokio::test]
async fn test_event_outcomes() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::from_secs(60));
    put_object(
        &dir.path().join("objects"),
        "uploads",
        BRAND_ARCHIVE,
        &zip_with(&[(BRAND_CSV_NAME, brand_csv().as_str())]),
    );

    let (status, text) = send(&app, "POST", "/", &event("uploads", "notes.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Skipped: notes.txt - not_zip_file");

    let (status, text) = send(&app, "POST", "/", &event("uploads", "gone.zip")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "Error processing: gone.zip - file_not_found");

    let (status, text) = send(&app, "POST", "/", &event("uploads", BRAND_ARCHIVE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, format!("Successfully processed: {}", BRAND_ARCHIVE));
}

#[tokio::test]
async fn test_duplicate_events_are_ignored() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::from_secs(60));

    // The first attempt counts even though it fails.
    let (status, _) = send(&app, "POST", "/", &event("uploads", "gone.zip")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, text) = send(&app, "POST", "/", &event("uploads", "gone.zip")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "OK: duplicate event ignored");

    let (status, _) = send(&app, "POST", "/", &event("other", "gone.zip")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_zero_window_disables_dedup() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::ZERO);

    for _ in 0..2 {
        let (status, text) = send(&app, "POST", "/", &event("uploads", "notes.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "Skipped: notes.txt - not_zip_file");
    }
}

#[tokio::test]
async fn test_manual_trigger() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::from_secs(60));

    let (status, text) = send(&app, "POST", "/test", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Bad Request: JSON required");

    let (status, text) = send(&app, "POST", "/test", r#"{"bucket": "uploads"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Bad Request: bucket and file required");

    // Errors are reported in the body with a 200.
    let (status, text) = send(&app, "POST", "/test", r#"{"bucket": "uploads", "file": "gone.zip"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let outcome: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(outcome["status"], "error");
    assert_eq!(outcome["reason"], "file_not_found");
    assert!(text.contains('\n'));
}
