//! HTTP surface for the slide indexing daemon: job control, SSE event
//! streaming, and read-only library browsing. One `axum::Router` built
//! around a shared [`JobManager`].

mod error;
mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sm_daemon::JobManager;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub jobs: JobManager,
}

pub fn build_router(jobs: JobManager) -> Router {
    let state = Arc::new(AppState { jobs });

    Router::new()
        .route("/health", get(routes::health))
        .route("/jobs/index", post(routes::index_job))
        .route("/jobs/:id", get(routes::get_job))
        .route("/jobs/:id/pause", post(routes::pause_job))
        .route("/jobs/:id/resume", post(routes::resume_job))
        .route("/jobs/:id/cancel", post(routes::cancel_job))
        .route("/jobs/:id/events", get(routes::job_events))
        .route("/library/summary", get(routes::library_summary))
        .route("/library/files", get(routes::library_files))
        .route("/library/files/:file_id/pages", get(routes::library_file_pages))
        .route("/library/pages/:page_id", get(routes::library_page_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
