//! IMG_VEC pipeline: local ONNX inference over each queued page's
//! thumbnail. Disabled cleanly (whole pipeline skipped) when no usable
//! model is present; a missing thumbnail skips just that page.

use sm_pipelines::image_embed::{default_model_path, ImageEmbedder};
use sm_protocol::errors::{IMG_VEC_FAIL, IMG_VEC_SKIPPED, THUMB_MISSING};
use sm_protocol::{ArtifactKind, ArtifactStatus, TaskKind, TaskStatus};
use tracing::{info, warn};

use crate::context::JobContext;
use crate::error::Result;

const ERROR_MESSAGE_CAP: usize = 500;

pub async fn run(ctx: &JobContext) -> Result<()> {
    if !ctx.options.embed.enabled_image {
        return Ok(());
    }
    let Some(task) = ctx.catalog.get_task_by_kind(ctx.job_id, TaskKind::ImgVec).await? else {
        return Ok(());
    };
    ctx.catalog.mark_task_running(task.id, ctx.now()).await?;

    let pages = ctx
        .catalog
        .list_queued_pages_for_kind(ArtifactKind::ImgVec)
        .await?;
    let total = pages.len().max(1);

    let model_path = default_model_path(&ctx.library_root);
    let mut embedder = match ImageEmbedder::load(&model_path) {
        Ok(Some(e)) => e,
        Ok(None) => {
            info!(path = %model_path.display(), "image embedder unavailable, skipping img_vec pipeline");
            for page in &pages {
                ctx.catalog
                    .set_artifact_status(
                        page.page_id,
                        ArtifactKind::ImgVec,
                        ArtifactStatus::Skipped,
                        Some(IMG_VEC_SKIPPED),
                        None,
                        ctx.now(),
                    )
                    .await?;
            }
            ctx.catalog
                .finish_task(task.id, TaskStatus::Skipped, Some(IMG_VEC_SKIPPED), None, ctx.now())
                .await?;
            return Ok(());
        }
        Err(e) => {
            let message: String = e.to_string().chars().take(ERROR_MESSAGE_CAP).collect();
            warn!(error = %message, "image embedder failed to load, skipping img_vec pipeline");
            for page in &pages {
                ctx.catalog
                    .set_artifact_status(
                        page.page_id,
                        ArtifactKind::ImgVec,
                        ArtifactStatus::Skipped,
                        Some(IMG_VEC_SKIPPED),
                        Some(&message),
                        ctx.now(),
                    )
                    .await?;
            }
            ctx.catalog
                .finish_task(task.id, TaskStatus::Skipped, Some(IMG_VEC_SKIPPED), Some(&message), ctx.now())
                .await?;
            return Ok(());
        }
    };

    let model_id = embedder.info().model_id.clone();
    let mut processed = 0usize;

    for page in &pages {
        ctx.checkpoint().await?;
        ctx.catalog
            .set_artifact_status(page.page_id, ArtifactKind::ImgVec, ArtifactStatus::Running, None, None, ctx.now())
            .await?;

        let thumb = ctx.catalog.get_thumbnail(page.page_id).await?;
        let Some(thumb) = thumb else {
            ctx.catalog
                .set_artifact_status(
                    page.page_id,
                    ArtifactKind::ImgVec,
                    ArtifactStatus::Skipped,
                    Some(THUMB_MISSING),
                    None,
                    ctx.now(),
                )
                .await?;
            ctx.publish(
                "artifact_state_changed",
                serde_json::json!({"page_id": page.page_id, "kind": "img_vec", "status": "skipped", "error_code": THUMB_MISSING}),
            )
            .await;
            processed += 1;
            heartbeat(ctx, task.id, processed, total).await?;
            continue;
        };

        match embedder.embed_image(std::path::Path::new(&thumb.image_path)) {
            Ok(vector) => {
                let dim = vector.len() as i64 / 4;
                ctx.catalog
                    .upsert_page_image_embedding(page.page_id, &model_id, dim, &vector, ctx.now())
                    .await?;
                ctx.catalog
                    .set_artifact_status(page.page_id, ArtifactKind::ImgVec, ArtifactStatus::Ready, None, None, ctx.now())
                    .await?;
                ctx.publish(
                    "artifact_state_changed",
                    serde_json::json!({"page_id": page.page_id, "kind": "img_vec", "status": "ready"}),
                )
                .await;
            }
            Err(e) => {
                let message: String = e.to_string().chars().take(ERROR_MESSAGE_CAP).collect();
                warn!(page_id = page.page_id, error = %message, "image embedding failed");
                ctx.catalog
                    .set_artifact_status(
                        page.page_id,
                        ArtifactKind::ImgVec,
                        ArtifactStatus::Error,
                        Some(IMG_VEC_FAIL),
                        Some(&message),
                        ctx.now(),
                    )
                    .await?;
                ctx.publish(
                    "artifact_state_changed",
                    serde_json::json!({"page_id": page.page_id, "kind": "img_vec", "status": "error", "error_code": IMG_VEC_FAIL}),
                )
                .await;
            }
        }

        processed += 1;
        heartbeat(ctx, task.id, processed, total).await?;
    }

    ctx.catalog
        .finish_task(task.id, TaskStatus::Succeeded, None, None, ctx.now())
        .await?;
    Ok(())
}

async fn heartbeat(ctx: &JobContext, task_id: i64, processed: usize, total: usize) -> Result<()> {
    ctx.catalog
        .heartbeat_task(task_id, processed as f64 / total as f64, Some("img_vec"), ctx.now())
        .await?;
    Ok(())
}
