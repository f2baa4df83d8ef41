//! THUMB pipeline: convert each file to PDF once, then render a JPEG
//! thumbnail per queued `thumb` page. A file whose PDF conversion fails
//! takes every one of its queued thumb artifacts down with it; a single
//! page's render failure is local to that page.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sm_pipelines::pdf_convert::convert_pptx_to_pdf;
use sm_pipelines::thumb::{render_pdf_page_to_thumb, thumb_size};
use sm_db::QueuedPage;
use sm_protocol::errors::{PDF_CONVERT_FAIL, THUMB_FAIL};
use sm_protocol::{ArtifactKind, ArtifactStatus, TaskKind, TaskStatus};
use tracing::warn;

use crate::context::JobContext;
use crate::error::Result;

const ERROR_MESSAGE_CAP: usize = 500;

pub async fn run(ctx: &JobContext) -> Result<()> {
    let Some(task) = ctx.catalog.get_task_by_kind(ctx.job_id, TaskKind::Thumb).await? else {
        return Ok(());
    };
    ctx.catalog.mark_task_running(task.id, ctx.now()).await?;

    let pages = ctx
        .catalog
        .list_queued_pages_for_kind(ArtifactKind::Thumb)
        .await?;
    let total = pages.len().max(1);

    let mut by_file: BTreeMap<i64, Vec<&QueuedPage>> = BTreeMap::new();
    for page in &pages {
        by_file.entry(page.file_id).or_default().push(page);
    }

    let soffice_path = resolve_soffice_path();
    let mut processed = 0usize;

    for (file_id, file_pages) in &by_file {
        ctx.checkpoint().await?;

        let pdf_path = pdf_cache_path(&ctx.library_root, *file_id);
        let convert_result = match &soffice_path {
            Some(soffice) => {
                convert_pptx_to_pdf(
                    soffice,
                    Path::new(&file_pages[0].file_path),
                    &pdf_path,
                    ctx.options.pdf.timeout_sec,
                )
                .await
            }
            None => Err(sm_pipelines::error::PipelineError::ConvertFailed(
                "no office suite found on PATH".to_string(),
            )),
        };

        if let Err(e) = convert_result {
            let message: String = e.to_string().chars().take(ERROR_MESSAGE_CAP).collect();
            warn!(file_id, error = %message, "pdf conversion failed");
            for page in file_pages {
                mark_error(ctx, page.page_id, PDF_CONVERT_FAIL, &message).await?;
            }
            processed += file_pages.len();
            heartbeat(ctx, task.id, processed, total).await?;
            continue;
        }

        for page in file_pages {
            ctx.checkpoint().await?;
            ctx.catalog
                .set_artifact_status(page.page_id, ArtifactKind::Thumb, ArtifactStatus::Running, None, None, ctx.now())
                .await?;

            let (width, height) = thumb_size(
                page.aspect,
                ctx.options.thumb.width,
                ctx.options.thumb.height_4_3,
                ctx.options.thumb.height_16_9,
            );
            let out_path = thumb_path(&ctx.library_root, *file_id, page.ordinal, page.aspect, width, height);

            match render_pdf_page_to_thumb(&pdf_path, (page.ordinal - 1) as u32, &out_path, width, height) {
                Ok(()) => {
                    ctx.catalog
                        .upsert_thumbnail(
                            page.page_id,
                            page.aspect,
                            width as i64,
                            height as i64,
                            &out_path.to_string_lossy(),
                            ctx.now(),
                        )
                        .await?;
                    ctx.catalog
                        .set_artifact_status(page.page_id, ArtifactKind::Thumb, ArtifactStatus::Ready, None, None, ctx.now())
                        .await?;
                    ctx.publish(
                        "artifact_state_changed",
                        serde_json::json!({"page_id": page.page_id, "kind": "thumb", "status": "ready"}),
                    )
                    .await;
                }
                Err(e) => {
                    let message: String = e.to_string().chars().take(ERROR_MESSAGE_CAP).collect();
                    warn!(page_id = page.page_id, error = %message, "thumbnail render failed");
                    mark_error(ctx, page.page_id, THUMB_FAIL, &message).await?;
                }
            }

            processed += 1;
            heartbeat(ctx, task.id, processed, total).await?;
        }
    }

    ctx.catalog
        .finish_task(task.id, TaskStatus::Succeeded, None, None, ctx.now())
        .await?;
    Ok(())
}

async fn mark_error(ctx: &JobContext, page_id: i64, code: &str, message: &str) -> Result<()> {
    ctx.catalog
        .set_artifact_status(page_id, ArtifactKind::Thumb, ArtifactStatus::Error, Some(code), Some(message), ctx.now())
        .await?;
    ctx.publish(
        "artifact_state_changed",
        serde_json::json!({"page_id": page_id, "kind": "thumb", "status": "error", "error_code": code}),
    )
    .await;
    Ok(())
}

async fn heartbeat(ctx: &JobContext, task_id: i64, processed: usize, total: usize) -> Result<()> {
    ctx.catalog
        .heartbeat_task(task_id, processed as f64 / total as f64, Some("thumb"), ctx.now())
        .await?;
    Ok(())
}

fn pdf_cache_path(library_root: &Path, file_id: i64) -> PathBuf {
    library_root.join(".slidemanager").join("pdf").join(format!("{file_id}.pdf"))
}

fn thumb_path(
    library_root: &Path,
    file_id: i64,
    ordinal: i64,
    aspect: sm_protocol::Aspect,
    width: u32,
    height: u32,
) -> PathBuf {
    library_root
        .join(".slidemanager")
        .join("thumbs")
        .join(file_id.to_string())
        .join(format!("{ordinal}_{}_{width}x{height}.jpg", aspect.as_str()))
}

/// Resolves the headless office suite binary: `soffice` on `PATH` on unix,
/// `soffice.exe` on `PATH` or one of the two canonical install locations
/// on Windows.
fn resolve_soffice_path() -> Option<String> {
    #[cfg(windows)]
    {
        const CANDIDATES: &[&str] = &[
            r"C:\Program Files\LibreOffice\program\soffice.exe",
            r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
        ];
        if let Some(found) = find_on_path("soffice.exe") {
            return Some(found);
        }
        CANDIDATES
            .iter()
            .find(|p| Path::new(p).exists())
            .map(|p| p.to_string())
    }
    #[cfg(not(windows))]
    {
        find_on_path("soffice")
    }
}

fn find_on_path(name: &str) -> Option<String> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .map(|p| p.to_string_lossy().into_owned())
}
