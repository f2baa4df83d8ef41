//! TEXT + BM25 pipeline: per queued `text` artifact (and its paired `bm25`
//! artifact when enabled), extract → normalize → upsert `page_text`/FTS →
//! mark both READY. A page-local extraction failure does not abort the run.

use std::path::Path;
use std::time::Instant;

use sm_pipelines::normalize::extract_page_text;
use sm_protocol::errors::TEXT_EXTRACT_FAIL;
use sm_protocol::{ArtifactKind, ArtifactStatus, TaskKind, TaskStatus};
use tracing::warn;

use crate::context::JobContext;
use crate::error::Result;

const ERROR_MESSAGE_CAP: usize = 500;

pub async fn run(ctx: &JobContext) -> Result<()> {
    let Some(task) = ctx.catalog.get_task_by_kind(ctx.job_id, TaskKind::Text).await? else {
        return Ok(());
    };
    ctx.catalog.mark_task_running(task.id, ctx.now()).await?;

    let pages = ctx
        .catalog
        .list_queued_pages_for_kind(ArtifactKind::Text)
        .await?;
    let total = pages.len().max(1);
    let mut since_heartbeat = 0u32;
    let mut last_heartbeat = Instant::now();

    for (i, page) in pages.iter().enumerate() {
        ctx.checkpoint().await?;
        mark_running(ctx, page.page_id).await?;

        match extract_page_text(Path::new(&page.file_path), page.ordinal as u32) {
            Ok((raw, norm, sig)) => {
                ctx.catalog
                    .upsert_page_text(page.page_id, &raw, &norm, &sig, ctx.options.enable_bm25, ctx.now())
                    .await?;
                mark_ready(ctx, page.page_id).await?;
            }
            Err(e) => {
                let message: String = e.to_string().chars().take(ERROR_MESSAGE_CAP).collect();
                warn!(page_id = page.page_id, error = %message, "text extraction failed");
                mark_error(ctx, page.page_id, &message).await?;
            }
        }

        since_heartbeat += 1;
        let due = since_heartbeat >= ctx.options.commit_every_pages
            || last_heartbeat.elapsed().as_secs_f64() >= ctx.options.commit_every_sec;
        if due {
            ctx.catalog
                .heartbeat_task(task.id, (i + 1) as f64 / total as f64, Some("text"), ctx.now())
                .await?;
            since_heartbeat = 0;
            last_heartbeat = Instant::now();
        }
    }

    ctx.catalog
        .finish_task(task.id, TaskStatus::Succeeded, None, None, ctx.now())
        .await?;
    Ok(())
}

async fn mark_running(ctx: &JobContext, page_id: i64) -> Result<()> {
    ctx.catalog
        .set_artifact_status(page_id, ArtifactKind::Text, ArtifactStatus::Running, None, None, ctx.now())
        .await?;
    if ctx.options.enable_bm25 {
        ctx.catalog
            .set_artifact_status(page_id, ArtifactKind::Bm25, ArtifactStatus::Running, None, None, ctx.now())
            .await?;
    }
    Ok(())
}

async fn mark_ready(ctx: &JobContext, page_id: i64) -> Result<()> {
    ctx.catalog
        .set_artifact_status(page_id, ArtifactKind::Text, ArtifactStatus::Ready, None, None, ctx.now())
        .await?;
    if ctx.options.enable_bm25 {
        ctx.catalog
            .set_artifact_status(page_id, ArtifactKind::Bm25, ArtifactStatus::Ready, None, None, ctx.now())
            .await?;
    }
    ctx.publish(
        "artifact_state_changed",
        serde_json::json!({"page_id": page_id, "kind": "text", "status": "ready"}),
    )
    .await;
    Ok(())
}

async fn mark_error(ctx: &JobContext, page_id: i64, message: &str) -> Result<()> {
    ctx.catalog
        .set_artifact_status(
            page_id,
            ArtifactKind::Text,
            ArtifactStatus::Error,
            Some(TEXT_EXTRACT_FAIL),
            Some(message),
            ctx.now(),
        )
        .await?;
    if ctx.options.enable_bm25 {
        ctx.catalog
            .set_artifact_status(
                page_id,
                ArtifactKind::Bm25,
                ArtifactStatus::Error,
                Some(TEXT_EXTRACT_FAIL),
                Some(message),
                ctx.now(),
            )
            .await?;
    }
    ctx.publish(
        "artifact_state_changed",
        serde_json::json!({"page_id": page_id, "kind": "text", "status": "error", "error_code": TEXT_EXTRACT_FAIL}),
    )
    .await;
    Ok(())
}
