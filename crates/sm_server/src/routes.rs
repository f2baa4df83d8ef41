use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sm_daemon::DaemonError;
use sm_protocol::errors::{JOB_NOT_FOUND, LIBRARY_ROOT_NOT_FOUND};
use sm_protocol::{hello_frame, JobOptions};

use crate::error::ApiError;
use crate::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

#[derive(Deserialize)]
pub struct IndexRequest {
    pub library_root: String,
    #[serde(default)]
    pub options: JobOptions,
}

pub async fn index_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<Value>, ApiError> {
    if !Path::new(&req.library_root).is_dir() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, LIBRARY_ROOT_NOT_FOUND));
    }

    let job_id = state
        .jobs
        .create(PathBuf::from(&req.library_root), req.options)
        .await?;

    Ok(Json(json!({"job_id": job_id})))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<Value>, ApiError> {
    let catalog = state.jobs.catalog();
    let Some(job) = catalog.get_job(id).await? else {
        return Err(ApiError::new(StatusCode::NOT_FOUND, JOB_NOT_FOUND));
    };

    let stats = catalog.job_stats(id).await?;
    let now_running = catalog.get_running_task(id).await?.map(|t| {
        json!({
            "task_id": t.task_id,
            "kind": t.kind.as_str(),
            "message": t.message,
            "progress": t.progress,
            "page_id": t.page_id,
            "file_id": t.file_id,
            "page_no": t.page_no,
            "file_path": t.file_path,
        })
    });
    let options: Value =
        serde_json::from_str(&job.options_json).unwrap_or_else(|_| json!({}));

    Ok(Json(json!({
        "ok": true,
        "job_id": job.id,
        "status": (*job.status).as_str(),
        "library_root": job.library_root,
        "created_at": job.created_epoch,
        "started_at": job.started_epoch,
        "finished_at": job.finished_epoch,
        "options": options,
        "stats": stats,
        "now_running": now_running,
    })))
}

pub async fn pause_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<Value>, ApiError> {
    swallow_not_found(state.jobs.pause(id).await)?;
    Ok(Json(json!({"ok": true})))
}

pub async fn resume_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<Value>, ApiError> {
    swallow_not_found(state.jobs.resume(id).await)?;
    Ok(Json(json!({"ok": true})))
}

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<Value>, ApiError> {
    swallow_not_found(state.jobs.cancel(id).await)?;
    Ok(Json(json!({"ok": true})))
}

/// `pause`/`resume`/`cancel` are no-ops on an unknown job id per the wire
/// contract; every other daemon error still surfaces as a 500.
fn swallow_not_found(result: Result<(), DaemonError>) -> Result<(), ApiError> {
    match result {
        Ok(()) | Err(DaemonError::JobNotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn job_events(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Response {
    let (backlog, rx) = state.jobs.bus().subscribe(id).await;

    let hello = std::iter::once(Ok::<Bytes, Infallible>(Bytes::from(hello_frame(&id.to_string()))));
    let replay = backlog
        .into_iter()
        .map(|e| Ok::<Bytes, Infallible>(Bytes::from(e.to_sse_frame())));
    let initial = futures::stream::iter(hello.chain(replay));

    let live = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Ok::<Bytes, Infallible>(Bytes::from(event.to_sse_frame())), rx)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let body = Body::from_stream(futures::stream::StreamExt::chain(initial, live));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .expect("static SSE response headers are always valid")
}

#[derive(Deserialize)]
pub struct LibraryQuery {
    pub library_root: Option<String>,
}

pub async fn library_summary(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LibraryQuery>,
) -> Result<Json<Value>, ApiError> {
    let summary = state.jobs.catalog().library_summary(q.library_root.as_deref()).await?;
    Ok(Json(json!({
        "ok": true,
        "files": summary.files,
        "pages": summary.pages,
        "artifacts": summary.artifacts,
    })))
}

pub async fn library_files(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LibraryQuery>,
) -> Result<Json<Value>, ApiError> {
    let files = state
        .jobs
        .catalog()
        .list_files_with_counts(q.library_root.as_deref())
        .await?;

    let files: Vec<Value> = files
        .into_iter()
        .map(|f| json!({"file": f.file, "artifacts": f.artifacts}))
        .collect();

    Ok(Json(json!({"ok": true, "files": files})))
}

pub async fn library_file_pages(
    State(state): State<Arc<AppState>>,
    AxumPath(file_id): AxumPath<i64>,
) -> Result<Json<Value>, ApiError> {
    let pages = state.jobs.catalog().list_pages_with_detail(file_id).await?;

    let pages: Vec<Value> = pages
        .into_iter()
        .map(|p| {
            json!({
                "page": p.page,
                "artifacts": p.artifacts,
                "text_excerpt": p.text_excerpt,
                "thumbnail_path": p.thumbnail_path,
            })
        })
        .collect();

    Ok(Json(json!({"ok": true, "pages": pages})))
}

pub async fn library_page_detail(
    State(state): State<Arc<AppState>>,
    AxumPath(page_id): AxumPath<i64>,
) -> Result<Json<Value>, ApiError> {
    let Some(detail) = state.jobs.catalog().page_detail(page_id).await? else {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "page_not_found"));
    };

    Ok(Json(json!({
        "ok": true,
        "page": detail.page,
        "artifacts": detail.artifacts,
        "raw_text": detail.raw_text,
        "norm_text": detail.norm_text,
        "thumbnail_path": detail.thumbnail_path,
    })))
}
