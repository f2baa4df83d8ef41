//! In-process request dispatch via `tower::ServiceExt::oneshot`, following
//! the same harness shape as other axum services in this workspace.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sm_daemon::{EventBus, JobManager};
use sm_db::Catalog;
use tempfile::TempDir;
use tower::ServiceExt;

/// Builds a router backed by a fresh on-disk catalog. The returned `TempDir`
/// must be kept alive for as long as the router is used, or its pooled
/// connections lose their backing file.
async fn test_app() -> (Router, TempDir) {
    let state_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open(&state_dir.path().join("index.sqlite"))
        .await
        .expect("catalog opens");
    let jobs = JobManager::new(catalog, EventBus::new());
    (sm_server::build_router(jobs), state_dir)
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    (status, body)
}

async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _state_dir) = test_app().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn index_job_rejects_missing_library_root() {
    let (app, _state_dir) = test_app().await;
    let (status, body) = post(
        &app,
        "/jobs/index",
        json!({"library_root": "/no/such/directory/ever"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["message"], json!("library_root_not_found"));
}

#[tokio::test]
async fn index_job_creates_a_job_and_get_job_reports_it() {
    let (app, _state_dir) = test_app().await;
    let library_root = tempfile::tempdir().unwrap();

    let (status, body) = post(
        &app,
        "/jobs/index",
        json!({"library_root": library_root.path().to_str().unwrap()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_i64().expect("job_id is a number");

    let (status, body) = get(&app, &format!("/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["job_id"], json!(job_id));
    assert_eq!(body["library_root"], json!(library_root.path().to_str().unwrap()));
}

#[tokio::test]
async fn get_job_reports_job_not_found_for_unknown_id() {
    let (app, _state_dir) = test_app().await;
    let (status, body) = get(&app, "/jobs/999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["message"], json!("job_not_found"));
}

#[tokio::test]
async fn pause_resume_cancel_are_noops_on_unknown_job() {
    let (app, _state_dir) = test_app().await;
    for action in ["pause", "resume", "cancel"] {
        let (status, body) = post(&app, &format!("/jobs/999999/{action}"), json!({})).await;
        assert_eq!(status, StatusCode::OK, "action {action}");
        assert_eq!(body, json!({"ok": true}), "action {action}");
    }
}

#[tokio::test]
async fn library_summary_on_empty_catalog_reports_zero_counts() {
    let (app, _state_dir) = test_app().await;
    let (status, body) = get(&app, "/library/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["files"], json!(0));
    assert_eq!(body["pages"], json!(0));
}

#[tokio::test]
async fn page_detail_reports_page_not_found_for_unknown_id() {
    let (app, _state_dir) = test_app().await;
    let (status, body) = get(&app, "/library/pages/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["message"], json!("page_not_found"));
}

#[tokio::test]
async fn job_events_streams_a_hello_frame_first() {
    let (app, _state_dir) = test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/jobs/1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    // The live tail of this stream only ends when the bus drops, so pull
    // just the first frame instead of collecting the whole (infinite) body.
    let mut body = response.into_body();
    let frame = tokio::time::timeout(std::time::Duration::from_secs(2), body.frame())
        .await
        .expect("hello frame arrives promptly")
        .expect("stream yields at least one frame")
        .expect("frame is not an error");
    let bytes = frame.into_data().expect("frame carries data");
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text, "data: {\"type\":\"hello\",\"job_id\":\"1\"}\n\n");
}
